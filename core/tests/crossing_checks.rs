//! Single checks through the engine's public operations.
//! None of these operations may write anything.

mod common;

use common::*;
use fiscal_crossing_core::{
    divergence::DivergenceKind,
    error::CrossingError,
    period::canonical_period,
    scoring::MAX_SCORE,
    severity::Severity,
    store::{InvoiceRow, SettingsRow},
};

const TAX_X: &str = "11.222.333/0001-81";

// ─────────────────────────────────────────────────────────────────────────────
// Revenue vs invoices
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn invoices_far_above_declared_revenue_is_critical_omission() {
    let engine = engine();
    add_company(&engine, "x", TAX_X);
    add_declaration(&engine, "d1", "x", "10/2025", 10_000.0, 0.0, at(2025, 11, 5, 10));
    add_invoice(&engine, invoice("nf1", "x", 20_000.0, date(2025, 10, 3)));
    add_invoice(&engine, invoice("nf2", "x", 15_000.0, date(2025, 10, 28)));
    // Outside the month: ignored.
    add_invoice(&engine, invoice("nf3", "x", 9_000.0, date(2025, 11, 1)));

    let bundle = engine.check_revenue_vs_invoices("x", "10/2025").unwrap();
    assert_eq!(bundle.divergence_count, 1);
    let d = &bundle.divergences[0];
    assert_eq!(d.kind, DivergenceKind::OmissaoReceita);
    assert_eq!(d.severity, Severity::Critical);
    assert_eq!(d.value, 25_000.0);
    assert_eq!(d.competency.map(|c| c.to_string()), Some("2025-10".to_string()));
    // 100 - (35 + 7)
    assert_eq!(bundle.score, 58);
    assert_eq!(bundle.total_divergent_value, 25_000.0);
}

#[test]
fn downward_amendment_is_compared_against_the_original() {
    let engine = engine();
    add_company(&engine, "z", TAX_X);
    add_declaration(&engine, "d1", "z", "03/2024", 50_000.0, 5_000.0, at(2024, 4, 10, 9));
    add_declaration(&engine, "d2", "z", "03/2024", 30_000.0, 3_000.0, at(2024, 5, 2, 9));
    add_invoice(&engine, invoice("nf1", "z", 30_000.0, date(2024, 3, 15)));
    add_transfer(&engine, "t1", date(2024, 3, 25), 3_000.0, "DAS 11222333000181");

    let bundle = engine.check_revenue_vs_invoices("z", "03/2024").unwrap();
    assert_eq!(bundle.divergence_count, 1, "{:?}", bundle.divergences);
    let d = &bundle.divergences[0];
    assert_eq!(d.kind, DivergenceKind::RetificacaoAMenor);
    assert_eq!(d.severity, Severity::Critical);
    assert_eq!(d.value, 20_000.0);
}

#[test]
fn no_filing_means_neutral_result() {
    let engine = engine();
    add_company(&engine, "w", TAX_X);
    add_invoice(&engine, invoice("nf1", "w", 8_000.0, date(2025, 6, 10)));

    let bundle = engine.check_revenue_vs_invoices("w", "06/2025").unwrap();
    assert!(bundle.divergences.is_empty());
    assert_eq!(bundle.score, MAX_SCORE);
    assert!(!bundle.has_divergences());
}

#[test]
fn period_spellings_aggregate_to_one_competency() {
    for raw in ["202506", "06/2025", "2025-06"] {
        assert_eq!(canonical_period(raw).as_deref(), Some("2025-06"));
    }

    let engine = engine();
    add_company(&engine, "e", TAX_X);
    add_declaration(&engine, "d1", "e", "202506", 10_000.0, 600.0, at(2025, 7, 1, 8));
    add_declaration(&engine, "d2", "e", "06/2025", 12_000.0, 720.0, at(2025, 7, 2, 8));
    add_declaration(&engine, "d3", "e", "2025-06", 12_000.0, 720.0, at(2025, 7, 3, 8));
    add_invoice(&engine, invoice("nf1", "e", 12_000.0, date(2025, 6, 12)));
    add_transfer(&engine, "t1", date(2025, 6, 20), 720.0, "DAS 11222333000181");

    // Every spelling of the public period lands on the same data.
    for period in ["06/2025", "202506", "2025-06"] {
        let bundle = engine.check_revenue_vs_invoices("e", period).unwrap();
        assert!(bundle.divergences.is_empty(), "{period}: {:?}", bundle.divergences);
    }

    // Amendments are not double counted: annual revenue is 12,000, not 34,000.
    engine
        .store
        .upsert_settings(&SettingsRow {
            municipality_name: None,
            state_sublimit: Some(20_000.0),
            municipal_sublimit: Some(30_000.0),
        })
        .unwrap();
    let mut engine = engine;
    engine.reload_settings().unwrap();
    let bundle = engine.check_sublimits("e", 2025).unwrap();
    assert!(bundle.divergences.is_empty(), "{:?}", bundle.divergences);
}

#[test]
fn municipality_mismatch_uses_place_of_service() {
    let engine = engine();
    add_company(&engine, "m", TAX_X);
    add_declaration(&engine, "d1", "m", "09/2025", 20_000.0, 0.0, at(2025, 10, 10, 9));
    let elsewhere = InvoiceRow {
        service_municipality: Some("Sumaré".into()),
        ..invoice("nf1", "m", 12_000.0, date(2025, 9, 3))
    };
    let home = InvoiceRow {
        service_municipality: Some("CAMPINAS - SP".into()),
        ..invoice("nf2", "m", 8_000.0, date(2025, 9, 4))
    };
    add_invoice(&engine, elsewhere);
    add_invoice(&engine, home);

    let bundle = engine.check_revenue_vs_invoices("m", "09/2025").unwrap();
    assert_eq!(bundle.divergence_count, 1, "{:?}", bundle.divergences);
    let d = &bundle.divergences[0];
    assert_eq!(d.kind, DivergenceKind::MunicipioDivergente);
    assert_eq!(d.severity, Severity::High);
    assert_eq!(d.value, 12_000.0);
}

#[test]
fn unpaid_tax_is_flagged_by_the_revenue_check() {
    let engine = engine();
    add_company(&engine, "p", TAX_X);
    add_declaration(&engine, "d1", "p", "08/2025", 10_000.0, 1_000.0, at(2025, 9, 10, 9));
    add_invoice(&engine, invoice("nf1", "p", 10_000.0, date(2025, 8, 3)));
    add_transfer(&engine, "t1", date(2025, 8, 20), 700.0, "REPASSE 11.222.333/0001-81");
    // Another company's payment.
    add_transfer(&engine, "t2", date(2025, 8, 21), 300.0, "REPASSE 99.888.777/0001-66");

    let bundle = engine.check_revenue_vs_invoices("p", "08/2025").unwrap();
    assert_eq!(bundle.divergence_count, 1, "{:?}", bundle.divergences);
    let d = &bundle.divergences[0];
    assert_eq!(d.kind, DivergenceKind::Inadimplente);
    assert_eq!(d.value, 300.0);
    // 30% shortfall
    assert_eq!(d.severity, Severity::High);
}

#[test]
fn unknown_company_and_bad_period_are_errors() {
    let engine = engine();
    add_company(&engine, "x", TAX_X);

    match engine.check_revenue_vs_invoices("ghost", "10/2025") {
        Err(CrossingError::CompanyNotFound { company_id }) => assert_eq!(company_id, "ghost"),
        other => panic!("expected CompanyNotFound, got {other:?}"),
    }
    assert!(matches!(
        engine.check_sublimits("ghost", 2025),
        Err(CrossingError::CompanyNotFound { .. })
    ));
    for bad in ["13/2025", "2025/10", "", "outubro"] {
        assert!(
            matches!(
                engine.check_withholding("x", bad),
                Err(CrossingError::InvalidPeriod { .. })
            ),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn single_checks_persist_nothing() {
    let engine = engine();
    add_company(&engine, "x", TAX_X);
    add_declaration(&engine, "d1", "x", "10/2025", 10_000.0, 0.0, at(2025, 11, 5, 10));
    add_invoice(&engine, invoice("nf1", "x", 35_000.0, date(2025, 10, 3)));

    engine.check_revenue_vs_invoices("x", "10/2025").unwrap();
    engine.check_withholding("x", "10/2025").unwrap();
    engine.check_sublimits("x", 2025).unwrap();

    assert_eq!(engine.store.divergence_count().unwrap(), 0);
    assert!(engine.store.events_for_company("x").unwrap().is_empty());
    assert_eq!(engine.store.get_company("x").unwrap().unwrap().risk_level, None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sublimits
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn state_sublimit_breach_only() {
    let engine = engine();
    add_company(&engine, "y", TAX_X);
    for month in 1..=10u32 {
        add_declaration(
            &engine,
            &format!("d{month}"),
            "y",
            &format!("{month:02}/2024"),
            400_000.0,
            0.0,
            at(2024, month, 25, 9),
        );
    }

    let bundle = engine.check_sublimits("y", 2024).unwrap();
    assert_eq!(bundle.divergence_count, 1);
    let d = &bundle.divergences[0];
    assert_eq!(d.kind, DivergenceKind::SublimiteExcedido);
    assert_eq!(d.severity, Severity::Medium);
    assert_eq!(d.value, 400_000.0);
    assert_eq!(d.competency, None);

    assert!(engine.check_sublimits("y", 2023).unwrap().divergences.is_empty());
}

#[test]
fn settings_record_overrides_sublimits() {
    let engine = engine();
    engine
        .store
        .upsert_settings(&SettingsRow {
            municipality_name: Some("Jundiaí".into()),
            state_sublimit: Some(100_000.0),
            municipal_sublimit: None,
        })
        .unwrap();
    let mut engine = engine;
    engine.reload_settings().unwrap();
    assert_eq!(engine.config().state_sublimit, 100_000.0);
    assert_eq!(engine.config().municipal_sublimit, 4_800_000.0);
    assert_eq!(engine.config().home_municipality.as_deref(), Some("Jundiaí"));

    add_company(&engine, "s", TAX_X);
    add_declaration(&engine, "d1", "s", "05/2025", 150_000.0, 0.0, at(2025, 6, 10, 9));
    let bundle = engine.check_sublimits("s", 2025).unwrap();
    assert_eq!(bundle.divergence_count, 1);
    // 50% over → HIGH (not strictly above 50)
    assert_eq!(bundle.divergences[0].severity, Severity::High);
}

// ─────────────────────────────────────────────────────────────────────────────
// Withholding
// ─────────────────────────────────────────────────────────────────────────────

fn withheld_invoice(id: &str, company_id: &str, value: f64, rate: Option<f64>) -> InvoiceRow {
    InvoiceRow {
        tax_withheld: true,
        rate,
        ..invoice(id, company_id, value, date(2025, 7, 10))
    }
}

#[test]
fn rate_and_withheld_amount_divergences() {
    let engine = engine();
    add_company(&engine, "r", TAX_X);
    // Effective rate 2%, invoices withheld at 5%.
    add_declaration(&engine, "d1", "r", "07/2025", 100_000.0, 2_000.0, at(2025, 8, 10, 9));
    add_invoice(&engine, withheld_invoice("nf1", "r", 60_000.0, Some(5.0)));
    add_invoice(&engine, withheld_invoice("nf2", "r", 40_000.0, None));

    let bundle = engine.check_withholding("r", "07/2025").unwrap();
    let kinds: Vec<DivergenceKind> = bundle.divergences.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![DivergenceKind::AliquotaDivergente, DivergenceKind::RetencaoInvalida]
    );
    assert!(bundle.divergences.iter().all(|d| d.severity == Severity::High));
    // expected withheld 5,000 vs declared 2,000
    assert!((bundle.divergences[1].value - 3_000.0).abs() < 1e-6);
}

#[test]
fn exempt_company_and_plain_invoices_are_not_checked() {
    let engine = engine();
    let mut exempt = company("ex", TAX_X);
    exempt.withholding_exempt = true;
    engine.store.insert_company(&exempt).unwrap();
    add_declaration(&engine, "d1", "ex", "07/2025", 100_000.0, 2_000.0, at(2025, 8, 10, 9));
    add_invoice(&engine, withheld_invoice("nf1", "ex", 100_000.0, Some(0.05)));
    assert!(engine.check_withholding("ex", "07/2025").unwrap().divergences.is_empty());

    add_company(&engine, "plain", "22.333.444/0001-55");
    add_declaration(&engine, "d2", "plain", "07/2025", 100_000.0, 2_000.0, at(2025, 8, 10, 9));
    add_invoice(&engine, invoice("nf2", "plain", 100_000.0, date(2025, 7, 10)));
    assert!(engine.check_withholding("plain", "07/2025").unwrap().divergences.is_empty());
}
