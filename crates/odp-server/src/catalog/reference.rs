//! Seeded reference data
//!
//! The country list is closed: the resolver never creates a country, so a code
//! missing from [`COUNTRIES`] is reported as unknown rather than registered.

use super::{NewCategory, NewCountry, SourceDescriptor};

/// Geographic grouping used by the reference country list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    America,
    Europe,
    Asia,
    MiddleEast,
    Africa,
    SouthPacific,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::America => "AMERICA",
            Region::Europe => "EUROPE",
            Region::Asia => "ASIA",
            Region::MiddleEast => "MIDDLE_EAST",
            Region::Africa => "AFRICA",
            Region::SouthPacific => "SOUTH_PACIFIC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCountry {
    pub iso3: &'static str,
    pub iso2: &'static str,
    pub name: &'static str,
    pub region: Region,
    pub subregion: &'static str,
}

impl ReferenceCountry {
    pub fn to_new_country(&self) -> NewCountry {
        NewCountry {
            iso3_code: self.iso3.to_string(),
            iso2_code: self.iso2.to_string(),
            name: self.name.to_string(),
            region: self.region.as_str().to_string(),
            subregion: Some(self.subregion.to_string()),
            income_level: None,
        }
    }
}

const fn country(
    iso3: &'static str,
    iso2: &'static str,
    name: &'static str,
    region: Region,
    subregion: &'static str,
) -> ReferenceCountry {
    ReferenceCountry {
        iso3,
        iso2,
        name,
        region,
        subregion,
    }
}

pub const COUNTRIES: &[ReferenceCountry] = &[
    country("ARG", "AR", "Argentina", Region::America, "South America"),
    country("BRA", "BR", "Brazil", Region::America, "South America"),
    country("CHL", "CL", "Chile", Region::America, "South America"),
    country("COL", "CO", "Colombia", Region::America, "South America"),
    country("MEX", "MX", "Mexico", Region::America, "North America"),
    country("USA", "US", "United States", Region::America, "North America"),
    country("CAN", "CA", "Canada", Region::America, "North America"),
    country("DEU", "DE", "Germany", Region::Europe, "Western Europe"),
    country("FRA", "FR", "France", Region::Europe, "Western Europe"),
    country("ITA", "IT", "Italy", Region::Europe, "Southern Europe"),
    country("SWE", "SE", "Sweden", Region::Europe, "Northern Europe"),
    country("NLD", "NL", "Netherlands", Region::Europe, "Western Europe"),
    country("CHE", "CH", "Switzerland", Region::Europe, "Western Europe"),
    country("DNK", "DK", "Denmark", Region::Europe, "Northern Europe"),
    country("FIN", "FI", "Finland", Region::Europe, "Northern Europe"),
    country("NOR", "NO", "Norway", Region::Europe, "Northern Europe"),
    country("TUR", "TR", "Turkey", Region::Europe, "Southern Europe"),
    country("ESP", "ES", "Spain", Region::Europe, "Southern Europe"),
    country("GBR", "GB", "United Kingdom", Region::Europe, "Northern Europe"),
    country("IND", "IN", "India", Region::Asia, "South Asia"),
    country("CHN", "CN", "China", Region::Asia, "East Asia"),
    country("JPN", "JP", "Japan", Region::Asia, "East Asia"),
    country("VNM", "VN", "Vietnam", Region::Asia, "Southeast Asia"),
    country("SGP", "SG", "Singapore", Region::Asia, "Southeast Asia"),
    country("ISR", "IL", "Israel", Region::MiddleEast, "Western Asia"),
    country("IRN", "IR", "Iran", Region::MiddleEast, "Western Asia"),
    country("ARE", "AE", "United Arab Emirates", Region::MiddleEast, "Arabian Peninsula"),
    country("SAU", "SA", "Saudi Arabia", Region::MiddleEast, "Arabian Peninsula"),
    country("QAT", "QA", "Qatar", Region::MiddleEast, "Arabian Peninsula"),
    country("NER", "NE", "Niger", Region::Africa, "West Africa"),
    country("ZAF", "ZA", "South Africa", Region::Africa, "Southern Africa"),
    country("EGY", "EG", "Egypt", Region::Africa, "North Africa"),
    country("COD", "CD", "Congo (DRC)", Region::Africa, "Central Africa"),
    country("MAR", "MA", "Morocco", Region::Africa, "North Africa"),
    country("DZA", "DZ", "Algeria", Region::Africa, "North Africa"),
    country("ETH", "ET", "Ethiopia", Region::Africa, "East Africa"),
    country("LBY", "LY", "Libya", Region::Africa, "North Africa"),
    country("TZA", "TZ", "Tanzania", Region::Africa, "East Africa"),
    country("TUN", "TN", "Tunisia", Region::Africa, "North Africa"),
    country("GHA", "GH", "Ghana", Region::Africa, "West Africa"),
    country("AUS", "AU", "Australia", Region::SouthPacific, "Oceania"),
    country("NZL", "NZ", "New Zealand", Region::SouthPacific, "Oceania"),
];

/// Look up a reference country by ISO3 or ISO2 code, case-insensitively
pub fn find_country(code: &str) -> Option<&'static ReferenceCountry> {
    let code = code.trim();
    COUNTRIES
        .iter()
        .find(|c| c.iso3.eq_ignore_ascii_case(code) || c.iso2.eq_ignore_ascii_case(code))
}

/// Map a two-letter code to its ISO3 equivalent
pub fn iso2_to_iso3(iso2: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|c| c.iso2.eq_ignore_ascii_case(iso2.trim()))
        .map(|c| c.iso3)
}

struct ReferenceSource {
    code: &'static str,
    name: &'static str,
    base_url: Option<&'static str>,
    description: &'static str,
}

const SOURCES: &[ReferenceSource] = &[
    ReferenceSource {
        code: "WB",
        name: "World Bank",
        base_url: Some("https://api.worldbank.org/v2/"),
        description: "World Development Indicators",
    },
    ReferenceSource {
        code: "IMF",
        name: "International Monetary Fund",
        base_url: Some("https://www.imf.org/external/datamapper/api/v1"),
        description: "International Financial Statistics and World Economic Outlook",
    },
    ReferenceSource {
        code: "UCDP",
        name: "Uppsala Conflict Data Program",
        base_url: Some("https://ucdpapi.pcr.uu.se/api"),
        description: "Organized violence and battle-related deaths",
    },
    ReferenceSource {
        code: "UNHCR",
        name: "UN High Commissioner for Refugees",
        base_url: Some("https://api.unhcr.org/population/v1"),
        description: "Refugee and displaced population statistics",
    },
    ReferenceSource {
        code: "IRENA",
        name: "International Renewable Energy Agency",
        base_url: Some("https://pxweb.irena.org/api/v1/en/IRENASTAT"),
        description: "Renewable energy capacity and generation",
    },
    ReferenceSource {
        code: "ITU",
        name: "International Telecommunication Union",
        base_url: None,
        description: "ICT access and usage",
    },
    ReferenceSource {
        code: "UNODC",
        name: "UN Office on Drugs and Crime",
        base_url: None,
        description: "Crime and criminal justice statistics",
    },
    ReferenceSource {
        code: "WRI",
        name: "World Resources Institute",
        base_url: None,
        description: "Emissions and environmental indicators",
    },
];

/// Descriptors for the providers known at bootstrap
pub fn sources() -> Vec<SourceDescriptor> {
    SOURCES
        .iter()
        .map(|s| SourceDescriptor {
            code: s.code.to_string(),
            name: s.name.to_string(),
            base_url: s.base_url.map(str::to_string),
            description: Some(s.description.to_string()),
        })
        .collect()
}

/// Descriptor for a known provider code, or a bare one for anything else
pub fn source_descriptor(code: &str) -> SourceDescriptor {
    sources()
        .into_iter()
        .find(|s| s.code.eq_ignore_ascii_case(code.trim()))
        .unwrap_or_else(|| SourceDescriptor::bare(code.trim()))
}

const CATEGORIES: &[(&str, &str)] = &[
    ("ECONOMIC", "Economic"),
    ("FINANCIAL", "Financial"),
    ("DEMOGRAPHIC", "Demographic"),
    ("SOCIAL", "Social"),
    ("HEALTH", "Health"),
    ("EDUCATION", "Education"),
    ("ENVIRONMENT", "Environment"),
    ("INFRASTRUCTURE", "Infrastructure"),
    ("GOVERNANCE", "Governance"),
    ("SECURITY", "Security"),
    ("HUMANITARIAN", "Humanitarian"),
];

/// Categories seeded at bootstrap
///
/// `ENERGY` hangs under `ENVIRONMENT`, so it must be inserted after its parent;
/// the bootstrap resolves parent codes in list order.
pub fn categories() -> Vec<(NewCategory, Option<&'static str>)> {
    let mut out: Vec<_> = CATEGORIES
        .iter()
        .map(|(code, name)| {
            (
                NewCategory {
                    code: (*code).to_string(),
                    name: (*name).to_string(),
                    parent_id: None,
                    description: None,
                },
                None,
            )
        })
        .collect();

    out.push((
        NewCategory {
            code: "ENERGY".to_string(),
            name: "Energy".to_string(),
            parent_id: None,
            description: Some("Energy production, capacity and consumption".to_string()),
        },
        Some("ENVIRONMENT"),
    ));

    out
}
