/// Unit tests for lead intake logic
/// Tests sanitization, email validation and market segment classification
/// through the layered `core` namespace
use rust_lead_capture_api::core::classifier::classify;
use rust_lead_capture_api::core::models::{LeadFields, MarketSegment, RawLeadForm};
use rust_lead_capture_api::core::sanitize::{sanitize_email, sanitize_lead};

fn form(name: &str, email: &str, company: &str, project_type: &str, message: &str) -> RawLeadForm {
    RawLeadForm {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        company: Some(company.to_string()),
        phone: None,
        project_type: Some(project_type.to_string()),
        message: Some(message.to_string()),
    }
}

fn segment_of(raw: &RawLeadForm) -> MarketSegment {
    classify(&sanitize_lead(raw).unwrap())
}

#[cfg(test)]
mod email_validation_tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(sanitize_email("user@example.com").is_ok());
        assert!(sanitize_email("test.user@example.com").is_ok());
        assert!(sanitize_email("user+tag@example.co.uk").is_ok());
        assert!(sanitize_email("user_name@example-domain.com").is_ok());
        assert!(sanitize_email("a@b.c").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(sanitize_email("userexample.com").is_err());
        assert!(sanitize_email("user@examplecom").is_err());
        assert!(sanitize_email("@example.com").is_err());
        assert!(sanitize_email("user@").is_err());
        assert!(sanitize_email("user name@example.com").is_err());
        assert!(sanitize_email("user@@example.com").is_err());
        assert!(sanitize_email("").is_err());
    }

    #[test]
    fn test_email_is_trimmed_and_lowercased() {
        assert_eq!(
            sanitize_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
    }
}

#[cfg(test)]
mod sanitize_lead_tests {
    use super::*;

    #[test]
    fn test_missing_name_or_email_is_rejected() {
        let missing_name = RawLeadForm {
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        let blank_email = form("Jane", "   ", "", "", "");

        for raw in [missing_name, blank_email] {
            let err = sanitize_lead(&raw).unwrap_err();
            assert_eq!(err.user_message(), "Name and email are required");
        }
    }

    #[test]
    fn test_invalid_email_message() {
        let err = sanitize_lead(&form("Jane", "not-an-email", "", "", "")).unwrap_err();
        assert_eq!(err.user_message(), "Invalid email format");
    }

    #[test]
    fn test_optional_fields_default_to_empty() {
        let raw = RawLeadForm {
            name: Some(" Jane ".to_string()),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };

        let fields = sanitize_lead(&raw).unwrap();

        assert_eq!(
            fields,
            LeadFields {
                name: "Jane".to_string(),
                email: "jane@example.com".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_long_message_is_truncated() {
        let raw = form("Jane", "jane@example.com", "", "", &"x".repeat(5000));
        let fields = sanitize_lead(&raw).unwrap();
        assert_eq!(fields.message.chars().count(), 1000);
    }

    #[test]
    fn test_form_accepts_both_project_type_spellings() {
        let camel: RawLeadForm =
            serde_json::from_str(r#"{"name":"A","email":"a@b.co","projectType":"competitive-intel"}"#)
                .unwrap();
        let snake: RawLeadForm =
            serde_json::from_str(r#"{"name":"A","email":"a@b.co","project_type":"competitive-intel"}"#)
                .unwrap();

        assert_eq!(camel.project_type.as_deref(), Some("competitive-intel"));
        assert_eq!(snake.project_type.as_deref(), Some("competitive-intel"));
    }
}

#[cfg(test)]
mod classification_tests {
    use super::*;

    #[test]
    fn test_vc_from_company_keyword() {
        let raw = form("Jane", "jane@example.com", "BioCapital Ventures", "", "");
        assert_eq!(segment_of(&raw), MarketSegment::Vc);
    }

    #[test]
    fn test_vc_from_email_domain() {
        let raw = form("Jane", "jane@acmefund.com", "", "", "");
        assert_eq!(segment_of(&raw), MarketSegment::Vc);
    }

    #[test]
    fn test_vc_from_due_diligence_investment_message() {
        let raw = form(
            "Jane",
            "jane@example.com",
            "Acme",
            "due-diligence",
            "Evaluating an INVESTMENT in a gene therapy company",
        );
        assert_eq!(segment_of(&raw), MarketSegment::Vc);
    }

    #[test]
    fn test_due_diligence_without_investment_is_not_vc() {
        let raw = form("Jane", "jane@example.com", "Acme", "due-diligence", "General review");
        assert_eq!(segment_of(&raw), MarketSegment::Unknown);
    }

    #[test]
    fn test_pharma_checked_before_biotech() {
        let raw = form("Jane", "jane@example.com", "Acme BioPharma", "", "");
        assert_eq!(segment_of(&raw), MarketSegment::Pharma);
    }

    #[test]
    fn test_biotech_from_company() {
        let raw = form("Jane", "jane@example.com", "Helix Therapeutics", "", "");
        assert_eq!(segment_of(&raw), MarketSegment::Biotech);
    }

    #[test]
    fn test_entrepreneur_signals() {
        let by_project = form("Jane", "jane@example.com", "Acme", "competitive-intel", "");
        let by_startup = form("Jane", "jane@example.com", "Acme", "", "Early startup here");
        let by_validate = form("Jane", "jane@example.com", "Acme", "", "Need to validate a market");

        for raw in [by_project, by_startup, by_validate] {
            assert_eq!(segment_of(&raw), MarketSegment::Entrepreneur);
        }
    }

    #[test]
    fn test_message_keywords_do_not_drive_company_rules() {
        let raw = form("Jane", "jane@example.com", "Acme", "", "We work with pharma and biotech");
        assert_eq!(segment_of(&raw), MarketSegment::Unknown);
    }

    #[test]
    fn test_segment_list_names() {
        assert_eq!(MarketSegment::Vc.list_name(), "VC Leads");
        assert_eq!(MarketSegment::Unknown.list_name(), "General Leads");
    }
}
