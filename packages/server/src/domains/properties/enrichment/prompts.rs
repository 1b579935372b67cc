use std::collections::BTreeSet;

use crate::domains::properties::enrichment::types::EnrichableField;

// =============================================================================
// LLM Prompts
// =============================================================================

pub const SEARCH_EXTRACTION_PROMPT: &str = r#"You are identifying an apartment property from web search results.

Given the text of a search results page and the property's street address, determine:
- property_name: the marketed name of the apartment community at that address (e.g. "Oak Ridge Apartments")
- website_url: the property's OWN website (not a listing site such as apartments.com, zillow, or a social network)
- confidence: a number from 0 to 1 for how sure you are that both refer to the property at this exact address

## Rules
- Only use information present in the text
- If the results do not clearly identify the property, use null
- Never return the street address itself as the property name
- Return a single JSON object: {"property_name": string|null, "website_url": string|null, "confidence": number}
"#;

pub const PROPERTY_EXTRACTION_PROMPT: &str = r#"You are extracting contact and property details from an apartment community's website.

Only extract the fields you are asked for. For each one:
- property_name: the marketed community name
- contact_phone: the leasing office phone, formatted as (XXX) XXX-XXXX
- contact_email: the leasing office email address
- contact_name: a named leasing or property manager, if one is listed
- amenities: short amenity tags (e.g. "Pool", "Fitness Center", "Pet Friendly")
- management_company: the company that manages the property

## Rules
- Use null for anything not stated on the page. NEVER guess or fabricate values.
- Format every phone number as (XXX) XXX-XXXX
- Do not return generic corporate or call-center contacts when a property-specific one exists
- confidence is a number from 0 to 1 for the extraction as a whole
- Return a single JSON object: {"extracted": {<field>: value, ...}, "confidence": number}
"#;

/// Name the extractor uses for a field in prompts and answers.
pub fn prompt_key(field: EnrichableField) -> &'static str {
    match field {
        EnrichableField::Name => "property_name",
        EnrichableField::ContactPhone => "contact_phone",
        EnrichableField::ContactEmail => "contact_email",
        EnrichableField::ContactName => "contact_name",
        EnrichableField::Amenities => "amenities",
        EnrichableField::LeasingLink => "website_url",
        EnrichableField::ManagementCompany => "management_company",
    }
}

/// Fields the website extractor can answer. The leasing link comes from
/// search, not from the page itself.
pub fn extractable(fields: &BTreeSet<EnrichableField>) -> Vec<EnrichableField> {
    fields
        .iter()
        .copied()
        .filter(|f| *f != EnrichableField::LeasingLink)
        .collect()
}

pub fn search_extraction_user_prompt(address: &str, results_text: &str) -> String {
    format!(
        "Property address: {}\n\nSearch results:\n{}",
        address, results_text
    )
}

pub fn property_extraction_user_prompt(
    address: &str,
    url: &str,
    fields: &[EnrichableField],
    content: &str,
) -> String {
    let wanted = fields
        .iter()
        .map(|f| prompt_key(*f))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Property address: {}\nWebsite: {}\nFields to extract: {}\n\nPage content:\n{}",
        address, url, wanted, content
    )
}
