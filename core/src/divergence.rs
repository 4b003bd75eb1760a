//! Findings produced by the checks, and the bundle returned per company.

use crate::{
    period::Competency,
    scoring::risk_score,
    severity::Severity,
    store::CompanyRow,
    types::{Amount, CompanyId},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Divergence taxonomy. Tags are the persisted labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    /// Latest amendment lowers revenue or tax due.
    RetificacaoAMenor,
    /// Declared revenue disagrees with issued invoices.
    OmissaoReceita,
    /// Invoiced services attributed to another municipality.
    MunicipioDivergente,
    /// Declared tax due not matched by relayed payments.
    Inadimplente,
    /// Annual revenue above a configured sublimit.
    SublimiteExcedido,
    /// Effective declared rate disagrees with withheld rates.
    AliquotaDivergente,
    /// Withheld amounts disagree with declared tax due.
    RetencaoInvalida,
    /// No ordinary filing for the period.
    Omisso,
}

impl DivergenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DivergenceKind::RetificacaoAMenor   => "RETIFICACAO_A_MENOR",
            DivergenceKind::OmissaoReceita      => "OMISSAO_RECEITA",
            DivergenceKind::MunicipioDivergente => "MUNICIPIO_DIVERGENTE",
            DivergenceKind::Inadimplente        => "INADIMPLENTE",
            DivergenceKind::SublimiteExcedido   => "SUBLIMITE_EXCEDIDO",
            DivergenceKind::AliquotaDivergente  => "ALIQUOTA_DIVERGENTE",
            DivergenceKind::RetencaoInvalida    => "RETENCAO_INVALIDA",
            DivergenceKind::Omisso              => "OMISSO",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        [
            DivergenceKind::RetificacaoAMenor,
            DivergenceKind::OmissaoReceita,
            DivergenceKind::MunicipioDivergente,
            DivergenceKind::Inadimplente,
            DivergenceKind::SublimiteExcedido,
            DivergenceKind::AliquotaDivergente,
            DivergenceKind::RetencaoInvalida,
            DivergenceKind::Omisso,
        ]
        .into_iter()
        .find(|k| k.as_str() == tag)
    }
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub severity: Severity,
    pub description: String,
    pub value: Amount,
    /// `None` for annual findings.
    pub competency: Option<Competency>,
}

impl Divergence {
    pub fn new(
        kind: DivergenceKind,
        severity: Severity,
        value: Amount,
        competency: Option<Competency>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            value,
            competency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub company_id: CompanyId,
    pub tax_id: String,
    pub legal_name: String,
    pub divergences: Vec<Divergence>,
    pub divergence_count: usize,
    pub total_divergent_value: Amount,
    pub score: u32,
}

impl ResultBundle {
    pub fn new(company: &CompanyRow, divergences: Vec<Divergence>) -> Self {
        Self {
            company_id: company.company_id.clone(),
            tax_id: company.tax_id.clone(),
            legal_name: company.legal_name.clone(),
            divergence_count: divergences.len(),
            total_divergent_value: divergences.iter().map(|d| d.value).sum(),
            score: risk_score(&divergences),
            divergences,
        }
    }

    /// Neutral result: nothing to compare, nothing found.
    pub fn neutral(company: &CompanyRow) -> Self {
        Self::new(company, Vec::new())
    }

    pub fn has_divergences(&self) -> bool {
        !self.divergences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_and_serialize_as_labels() {
        for kind in [DivergenceKind::RetificacaoAMenor, DivergenceKind::Omisso, DivergenceKind::AliquotaDivergente] {
            assert_eq!(DivergenceKind::parse(kind.as_str()), Some(kind));
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(DivergenceKind::parse("UNKNOWN"), None);
    }
}
