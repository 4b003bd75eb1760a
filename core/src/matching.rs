//! Heuristic extraction from free text and raw payloads.
//!
//! Transfers carry no structured company reference: the company's tax ID
//! has to be found inside the origin/description text. This is a
//! best-effort join, NOT a guaranteed-correct one. Known behaviour that is
//! kept on purpose:
//!   - all non-digit characters are discarded before matching, so digits
//!     from neighbouring numbers can combine into a false match;
//!   - an ID that is a substring of a longer ID matches the longer one.
//!
//! Invoice payloads are likewise scanned for an embedded rate or service
//! municipality when the structured field is missing.

use regex::Regex;
use std::sync::OnceLock;

fn rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)al[ií]quota\w*["']?\s*[:=>]?\s*["']?\s*(\d+(?:[.,]\d+)?)"#)
            .expect("rate regex")
    })
}

fn municipality_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)munic[ií]pio\w*["']?\s*[:=>]\s*["']?([^"'<,}\n]+)"#)
            .expect("municipality regex")
    })
}

pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// True when the digits of `id` appear inside the digits of `text`.
/// An ID without digits never matches.
pub fn match_by_embedded_id(text: &str, id: &str) -> bool {
    let needle = digits_only(id);
    if needle.is_empty() {
        return false;
    }
    digits_only(text).contains(&needle)
}

/// Match against each free-text field separately so digits from two
/// different fields are never glued together.
pub fn any_field_matches(fields: &[Option<&str>], id: &str) -> bool {
    fields
        .iter()
        .flatten()
        .any(|text| match_by_embedded_id(text, id))
}

/// Rates arrive either as a fraction (0.05) or as a percentage (5.00).
/// Returns the fraction, or `None` when the value is not a usable rate.
pub fn normalize_rate(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let rate = if raw > 1.0 { raw / 100.0 } else { raw };
    (rate <= 1.0).then_some(rate)
}

/// Pull a withholding rate out of a raw invoice payload.
pub fn extract_rate(payload: &str) -> Option<f64> {
    let caps = rate_re().captures(payload)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    normalize_rate(value)
}

/// Pull the place-of-service municipality out of a raw invoice payload.
/// Numeric values (IBGE codes under `CodigoMunicipio` and the like) are
/// not names and are skipped.
pub fn extract_municipality(payload: &str) -> Option<String> {
    municipality_re()
        .captures_iter(payload)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|name| name.chars().any(char::is_alphabetic))
        .map(str::to_string)
}

/// Case-insensitive containment in either direction.
pub fn same_municipality(candidate: &str, home: &str) -> bool {
    let candidate = candidate.trim().to_lowercase();
    let home = home.trim().to_lowercase();
    if candidate.is_empty() || home.is_empty() {
        return true;
    }
    candidate.contains(&home) || home.contains(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_tax_id_matches_plain_digits() {
        assert!(match_by_embedded_id("REPASSE ISS CNPJ 12.345.678/0001-90", "12345678000190"));
        assert!(match_by_embedded_id("12345678000190", "12.345.678/0001-90"));
    }

    #[test]
    fn missing_digits_do_not_match() {
        assert!(!match_by_embedded_id("REPASSE SEM IDENTIFICACAO", "12345678000190"));
        assert!(!match_by_embedded_id("12345678000190", "sem-digitos"));
        assert!(!match_by_embedded_id("", "1"));
    }

    #[test]
    fn adjacent_numbers_can_combine_into_a_match() {
        // "123456 78000190" collapses to the full ID once spaces are dropped.
        assert!(match_by_embedded_id("LOTE 123456 REF 78000190", "12345678000190"));
    }

    #[test]
    fn shorter_id_matches_inside_longer_one() {
        assert!(match_by_embedded_id("CNPJ 112345678000190", "12345678000190"));
        assert!(match_by_embedded_id("CNPJ 12345678000190", "45678000"));
    }

    #[test]
    fn fields_are_matched_independently() {
        let fields = [Some("ORIGEM 1234567"), Some("8000190 DOC")];
        assert!(!any_field_matches(&fields, "12345678000190"));
        assert!(any_field_matches(&[None, Some("12345678000190")], "12345678000190"));
    }

    #[test]
    fn rate_from_payload_in_both_notations() {
        assert_eq!(extract_rate(r#"{"aliquota": "5.00"}"#), Some(0.05));
        assert_eq!(extract_rate("<Aliquota>0.02</Aliquota>"), Some(0.02));
        assert_eq!(extract_rate("Alíquota: 3,5"), Some(0.035));
        assert_eq!(extract_rate("valor 100"), None);
        assert_eq!(extract_rate("aliquota: 0"), None);
    }

    #[test]
    fn municipality_from_payload() {
        assert_eq!(
            extract_municipality(r#"{"municipioPrestacao":"Campinas","valor":10}"#).as_deref(),
            Some("Campinas")
        );
        assert_eq!(
            extract_municipality("<MunicipioIncidencia>São Paulo</MunicipioIncidencia>").as_deref(),
            Some("São Paulo")
        );
        assert_eq!(extract_municipality("nada aqui"), None);
    }

    #[test]
    fn municipality_code_is_not_a_name() {
        let coded = "<Servico><Valores><ValorServicos>100</ValorServicos></Valores>\
                     <CodigoMunicipio>3509502</CodigoMunicipio></Servico>";
        assert_eq!(extract_municipality(coded), None);

        let both = "<CodigoMunicipio>3509502</CodigoMunicipio>\
                    <MunicipioPrestacao>Sumaré</MunicipioPrestacao>";
        assert_eq!(extract_municipality(both).as_deref(), Some("Sumaré"));
    }

    #[test]
    fn municipality_comparison_is_case_insensitive_substring() {
        assert!(same_municipality("CAMPINAS - SP", "Campinas"));
        assert!(same_municipality("campinas", "Campinas/SP"));
        assert!(!same_municipality("Sumaré", "Campinas"));
    }
}
