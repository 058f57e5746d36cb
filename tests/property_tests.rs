/// Property-based tests using proptest
/// Tests invariants that should hold for all form inputs
use proptest::prelude::*;
use rust_lead_capture_api::analytics::AnalyticsTracker;
use rust_lead_capture_api::classifier::classify;
use rust_lead_capture_api::export::leads_to_csv;
use rust_lead_capture_api::lead_capture::LeadCaptureService;
use rust_lead_capture_api::models::{
    FormType, Lead, LeadFields, MarketSegment, PageContext, RawLeadForm, SubmissionResult,
};
use rust_lead_capture_api::sanitize::{sanitize_email, sanitize_string, MAX_FIELD_CHARS};
use rust_lead_capture_api::storage::{EventLog, LeadStore, MemoryBackend};
use std::sync::Arc;

// Property: sanitizing never panics and never exceeds the field cap
proptest! {
    #[test]
    fn sanitize_string_never_panics(input in "\\PC*") {
        let _ = sanitize_string(Some(&input));
    }

    #[test]
    fn sanitize_string_is_bounded_and_trimmed(input in "\\s{0,3}[a-zA-Zé日 ]{0,1500}\\s{0,3}") {
        let output = sanitize_string(Some(&input));
        prop_assert!(output.chars().count() <= MAX_FIELD_CHARS);
        prop_assert!(input.trim().starts_with(&output));
    }

    #[test]
    fn sanitize_string_is_idempotent(input in "\\PC{0,1200}") {
        let once = sanitize_string(Some(&input));
        let twice = sanitize_string(Some(&once));
        // Truncation can expose trailing whitespace, which the second pass trims
        prop_assert_eq!(twice, once.trim_end().to_string());
    }
}

// Property: email validation accepts well-formed addresses and rejects the rest
proptest! {
    #[test]
    fn well_formed_emails_are_accepted_lowercased(
        local in "[A-Za-z0-9._%+-]{1,20}",
        domain in "[A-Za-z0-9-]{1,15}",
        tld in "[A-Za-z]{2,6}"
    ) {
        let email = format!("  {}@{}.{} ", local, domain, tld);
        let sanitized = sanitize_email(&email);
        prop_assert!(sanitized.is_ok());
        prop_assert_eq!(sanitized.unwrap(), email.trim().to_lowercase());
    }

    #[test]
    fn strings_without_at_sign_are_rejected(input in "[^@]*") {
        prop_assert!(sanitize_email(&input).is_err());
    }

    #[test]
    fn addresses_without_dot_in_domain_are_rejected(
        local in "[a-z0-9]{1,10}",
        domain in "[a-z0-9]{1,10}"
    ) {
        let email = format!("{}@{}", local, domain);
        prop_assert!(sanitize_email(&email).is_err());
    }
}

fn fields(email: String, company: String, project_type: String, message: String) -> LeadFields {
    LeadFields {
        name: "Test".to_string(),
        email,
        company,
        project_type,
        message,
        ..Default::default()
    }
}

// Property: classification is total, deterministic and honours rule priority
proptest! {
    #[test]
    fn classify_is_deterministic(
        email in "\\PC{0,40}",
        company in "\\PC{0,40}",
        project_type in "\\PC{0,20}",
        message in "\\PC{0,80}"
    ) {
        let f = fields(email, company, project_type, message);
        prop_assert_eq!(classify(&f), classify(&f));
    }

    #[test]
    fn vc_keyword_in_company_always_wins(
        prefix in "[A-Za-z ]{0,10}",
        keyword in prop::sample::select(vec!["Capital", "PARTNERS", "ventures", "Fund", "VC"]),
        extra in prop::sample::select(vec!["Pharma", "Biotech", "Genomics", ""]),
        message in "[a-z ]{0,40}"
    ) {
        let company = format!("{}{} {}", prefix, keyword, extra);
        let f = fields("someone@example.com".to_string(), company, String::new(), message);
        prop_assert_eq!(classify(&f), MarketSegment::Vc);
    }

    #[test]
    fn pharma_beats_biotech(
        keyword in prop::sample::select(vec!["pharma", "BioPharma", "Pharmaceuticals"])
    ) {
        let f = fields(
            "someone@example.com".to_string(),
            format!("Acme {} Bio", keyword),
            String::new(),
            String::new(),
        );
        prop_assert_eq!(classify(&f), MarketSegment::Pharma);
    }
}

// Property: CSV export is readable back field for field
proptest! {
    #[test]
    fn csv_export_preserves_free_text(
        name in "[A-Za-z ,\"]{1,30}",
        message in "[A-Za-z0-9 ,\"\n\r]{0,80}"
    ) {
        let mut lead = Lead::capture(
            fields("jane@example.com".to_string(), String::new(), String::new(), message.clone()),
            FormType::Contact,
            MarketSegment::Unknown,
            "test",
            &PageContext::default(),
        );
        lead.fields.name = name.clone();

        let csv = leads_to_csv(std::slice::from_ref(&lead)).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        prop_assert_eq!(&record[2], name.as_str());
        prop_assert_eq!(&record[8], message.as_str());
    }
}

struct Pipeline {
    service: LeadCaptureService,
    leads: Arc<LeadStore>,
    events: Arc<EventLog>,
}

/// A pipeline on an in-memory backend that already holds `prior` leads.
fn pipeline_with(prior: usize) -> Pipeline {
    let backend = Arc::new(MemoryBackend::new());
    let leads = Arc::new(LeadStore::new(backend.clone()));
    let events = Arc::new(EventLog::new(backend));
    let tracker = Arc::new(AnalyticsTracker::new(events.clone(), leads.clone()));
    let service = LeadCaptureService::new(leads.clone(), tracker, "test".to_string());
    let pipeline = Pipeline { service, leads, events };

    for n in 0..prior {
        let email = format!("seed{}@example.com", n);
        let result = submit(&pipeline, FormType::Contact, raw_form("Seed", &email));
        assert!(result.success);
    }
    pipeline
}

fn raw_form(name: &str, email: &str) -> RawLeadForm {
    RawLeadForm {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        ..Default::default()
    }
}

fn submit(pipeline: &Pipeline, form_type: FormType, raw: RawLeadForm) -> SubmissionResult {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(pipeline.service.submit(form_type, &raw, &PageContext::default()))
}

fn malformed_email() -> impl Strategy<Value = String> {
    prop_oneof![
        "[^@]{0,30}",
        "[a-z0-9]{1,10}@[a-z0-9]{1,10}",
        "@[a-z0-9]{1,10}\\.[a-z]{2,4}",
        "[a-z0-9]{1,10}@ [a-z0-9]{1,10}\\.[a-z]{2,4}",
    ]
}

// Property: a submission stores exactly one lead when valid and nothing otherwise
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valid_submission_appends_exactly_one_lead(
        prior in 0usize..3,
        name in "[A-Za-z]{1,12}( [A-Za-z]{1,12})?",
        local in "[A-Za-z0-9._%+-]{1,20}",
        domain in "[A-Za-z0-9-]{1,15}",
        tld in "[A-Za-z]{2,6}",
        form_type in prop::sample::select(vec![FormType::Contact, FormType::Demo])
    ) {
        let pipeline = pipeline_with(prior);
        let email = format!(" {}@{}.{} ", local, domain, tld);

        let result = submit(&pipeline, form_type, raw_form(&name, &email));

        prop_assert!(result.success);
        prop_assert!(result.error.is_none());
        let lead = result.lead.unwrap();
        prop_assert_eq!(&lead.fields.email, &email.trim().to_lowercase());
        prop_assert_eq!(lead.form_type, form_type);

        let stored = pipeline.leads.list();
        prop_assert_eq!(stored.len(), prior + 1);
        prop_assert_eq!(stored.last().map(|l| &l.fields.email), Some(&lead.fields.email));
        prop_assert_eq!(pipeline.events.list().len(), prior + 1);
    }

    #[test]
    fn malformed_email_leaves_stores_untouched(
        prior in 0usize..3,
        email in malformed_email()
    ) {
        let pipeline = pipeline_with(prior);
        let leads_before = pipeline.leads.list();
        let events_before = pipeline.events.list().len();

        let result = submit(&pipeline, FormType::Contact, raw_form("Jane Doe", &email));

        prop_assert!(!result.success);
        prop_assert!(result.lead.is_none());
        prop_assert!(result.error.is_some());
        prop_assert_eq!(pipeline.leads.list(), leads_before);
        prop_assert_eq!(pipeline.events.list().len(), events_before);
    }

    #[test]
    fn blank_name_is_rejected_whatever_the_email(
        prior in 0usize..3,
        name in "\\s{0,4}",
        email in prop_oneof![Just("jane@example.com".to_string()), malformed_email()]
    ) {
        let pipeline = pipeline_with(prior);

        let result = submit(&pipeline, FormType::Demo, raw_form(&name, &email));

        prop_assert!(!result.success);
        prop_assert_eq!(pipeline.leads.len(), prior);
        prop_assert_eq!(pipeline.events.list().len(), prior);
    }
}
