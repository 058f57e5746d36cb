//! Market segment classification for captured leads.
//!
//! Rules run in a fixed priority order and the first match wins. The order
//! matters for overlapping keywords: "BioCapital Partners" is a VC firm,
//! not a biotech, because the VC rule is checked first.

use crate::models::{LeadFields, MarketSegment};

const VC_KEYWORDS: [&str; 6] = ["capital", "partners", "ventures", "investments", "fund", "vc"];
const PHARMA_KEYWORDS: [&str; 4] = ["pharma", "pharmaceutical", "pharmaceuticals", "biopharma"];
const BIOTECH_KEYWORDS: [&str; 5] = ["biotech", "bio", "therapeutics", "genomics", "biologics"];

/// Classifies a lead into a market segment. Total and deterministic.
pub fn classify(fields: &LeadFields) -> MarketSegment {
    let email = fields.email.to_lowercase();
    let company = fields.company.to_lowercase();
    let message = fields.message.to_lowercase();
    let project_type = fields.project_type.to_lowercase();

    let mentions_any =
        |keywords: &[&str]| keywords.iter().any(|k| email.contains(k) || company.contains(k));

    if mentions_any(&VC_KEYWORDS) {
        return MarketSegment::Vc;
    }
    if project_type == "due-diligence" && message.contains("investment") {
        return MarketSegment::Vc;
    }
    if mentions_any(&PHARMA_KEYWORDS) {
        return MarketSegment::Pharma;
    }
    if mentions_any(&BIOTECH_KEYWORDS) {
        return MarketSegment::Biotech;
    }
    if project_type == "competitive-intel"
        || message.contains("startup")
        || message.contains("validate")
    {
        return MarketSegment::Entrepreneur;
    }

    MarketSegment::Unknown
}
