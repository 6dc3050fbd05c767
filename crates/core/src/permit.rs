use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payment::BillItem;

/// The permits and certificates the office issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PermitType {
    /// Chainsaw registration.
    #[serde(rename = "CSAW")]
    Csaw,
    /// Certificate of verification for log transport.
    #[serde(rename = "COV")]
    Cov,
    /// Private tree plantation registration.
    #[serde(rename = "PTPR")]
    Ptpr,
    /// Tree cutting permit.
    #[serde(rename = "TCP")]
    Tcp,
    /// Private land timber permit.
    #[serde(rename = "PLTP")]
    Pltp,
    /// Special private land timber permit.
    #[serde(rename = "SPLTP")]
    Spltp,
}

impl PermitType {
    pub const ALL: [Self; 6] = [
        Self::Csaw,
        Self::Cov,
        Self::Ptpr,
        Self::Tcp,
        Self::Pltp,
        Self::Spltp,
    ];

    /// Short code, also used as the `custom_id` prefix.
    pub fn code(self) -> &'static str {
        match self {
            Self::Csaw => "CSAW",
            Self::Cov => "COV",
            Self::Ptpr => "PTPR",
            Self::Tcp => "TCP",
            Self::Pltp => "PLTP",
            Self::Spltp => "SPLTP",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Csaw => "Chainsaw Registration",
            Self::Cov => "Certificate of Verification",
            Self::Ptpr => "Private Tree Plantation Registration",
            Self::Tcp => "Tree Cutting Permit",
            Self::Pltp => "Private Land Timber Permit",
            Self::Spltp => "Special Private Land Timber Permit",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Document keys that must be uploaded before submission.
    pub fn required_documents(self) -> &'static [&'static str] {
        match self {
            Self::Csaw => &[
                "chainsaw_receipt",
                "chainsaw_specification",
                "deed_of_sale_or_affidavit",
                "business_permit",
            ],
            Self::Cov => &[
                "transport_document",
                "certificate_of_origin",
                "tally_sheet",
                "vehicle_registration",
            ],
            Self::Ptpr => &[
                "land_title",
                "tax_declaration",
                "plantation_map",
                "photographs",
            ],
            Self::Tcp => &[
                "land_title",
                "barangay_certification",
                "tree_inventory",
                "site_photographs",
            ],
            Self::Pltp => &[
                "land_title",
                "tree_inventory",
                "utilization_plan",
                "lgu_endorsement",
            ],
            Self::Spltp => &[
                "land_title",
                "tree_inventory",
                "utilization_plan",
                "lgu_endorsement",
                "sworn_undertaking",
            ],
        }
    }

    /// Document keys that may be uploaded but are not required.
    pub fn optional_documents(self) -> &'static [&'static str] {
        match self {
            Self::Csaw => &["permit_to_sell", "authorization_letter"],
            Self::Cov => &["previous_cov", "authorization_letter"],
            Self::Ptpr => &["special_power_of_attorney"],
            Self::Tcp => &["special_power_of_attorney", "dpwh_clearance"],
            Self::Pltp | Self::Spltp => &["special_power_of_attorney", "ncip_clearance"],
        }
    }

    /// Whether `key` is a document this permit type accepts.
    pub fn accepts_document(self, key: &str) -> bool {
        self.required_documents().contains(&key) || self.optional_documents().contains(&key)
    }

    /// Fee schedule used when an accountant issues an order of payment
    /// without itemizing it.
    pub fn default_fees(self) -> Vec<BillItem> {
        let items: &[(&str, &str, i64)] = match self {
            Self::Csaw => &[
                ("Chainsaw registration fee", "RA 9175", 500_00),
                ("Oath fee", "DAO 2003-29", 36_00),
            ],
            Self::Cov => &[
                ("Certification fee", "DAO 2021-04", 50_00),
                ("Inspection fee", "DAO 2021-04", 100_00),
            ],
            Self::Ptpr => &[
                ("Registration fee", "DMO 99-20", 50_00),
                ("Inspection fee", "DMO 99-20", 150_00),
            ],
            Self::Tcp => &[
                ("Permit fee", "DAO 2000-21", 100_00),
                ("Inventory fee", "DAO 2000-21", 360_00),
            ],
            Self::Pltp => &[
                ("Permit fee", "DAO 2000-21", 300_00),
                ("Inventory fee", "DAO 2000-21", 500_00),
            ],
            Self::Spltp => &[
                ("Permit fee", "DAO 2000-21", 500_00),
                ("Inventory fee", "DAO 2000-21", 1_000_00),
            ],
        };
        items
            .iter()
            .map(|&(description, legal_basis, amount)| {
                BillItem::new(description, legal_basis, amount)
            })
            .collect()
    }
}

impl fmt::Display for PermitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Permit-specific form fields. The variant must match the application's
/// [`PermitType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "permit_type")]
pub enum PermitDetails {
    #[serde(rename = "CSAW")]
    Chainsaw(ChainsawDetails),
    #[serde(rename = "COV")]
    Cov(CovDetails),
    #[serde(rename = "PTPR")]
    Ptpr(PlantationDetails),
    #[serde(rename = "TCP")]
    TreeCutting(TreeCuttingDetails),
    #[serde(rename = "PLTP")]
    Pltp(TimberDetails),
    #[serde(rename = "SPLTP")]
    Spltp(TimberDetails),
}

impl PermitDetails {
    pub fn permit_type(&self) -> PermitType {
        match self {
            Self::Chainsaw(_) => PermitType::Csaw,
            Self::Cov(_) => PermitType::Cov,
            Self::Ptpr(_) => PermitType::Ptpr,
            Self::TreeCutting(_) => PermitType::Tcp,
            Self::Pltp(_) => PermitType::Pltp,
            Self::Spltp(_) => PermitType::Spltp,
        }
    }

    /// An empty form for `permit_type`, used for freshly created drafts.
    pub fn empty(permit_type: PermitType) -> Self {
        match permit_type {
            PermitType::Csaw => Self::Chainsaw(ChainsawDetails::default()),
            PermitType::Cov => Self::Cov(CovDetails::default()),
            PermitType::Ptpr => Self::Ptpr(PlantationDetails::default()),
            PermitType::Tcp => Self::TreeCutting(TreeCuttingDetails::default()),
            PermitType::Pltp => Self::Pltp(TimberDetails::default()),
            PermitType::Spltp => Self::Spltp(TimberDetails::default()),
        }
    }

    /// Names of required fields that are blank, prefixed with `details.`.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        let mut need = |ok: bool, field: &str| {
            if !ok {
                missing.push(format!("details.{field}"));
            }
        };
        match self {
            Self::Chainsaw(d) => {
                need(filled(&d.brand), "brand");
                need(filled(&d.model), "model");
                need(filled(&d.serial_number), "serial_number");
                need(filled(&d.purpose), "purpose");
            }
            Self::Cov(d) => {
                need(filled(&d.origin), "origin");
                need(filled(&d.destination), "destination");
                need(!d.species.is_empty(), "species");
                need(d.volume_cubic_meters > 0.0, "volume_cubic_meters");
                need(filled(&d.vehicle_plate_number), "vehicle_plate_number");
            }
            Self::Ptpr(d) => {
                need(filled(&d.location), "location");
                need(d.area_hectares > 0.0, "area_hectares");
                need(!d.species.is_empty(), "species");
                need(d.number_of_trees > 0, "number_of_trees");
            }
            Self::TreeCutting(d) => {
                need(filled(&d.location), "location");
                need(!d.species.is_empty(), "species");
                need(d.number_of_trees > 0, "number_of_trees");
                need(filled(&d.purpose), "purpose");
            }
            Self::Pltp(d) | Self::Spltp(d) => {
                need(filled(&d.location), "location");
                need(d.area_hectares > 0.0, "area_hectares");
                need(!d.species.is_empty(), "species");
                need(d.number_of_trees > 0, "number_of_trees");
                need(
                    d.estimated_volume_cubic_meters > 0.0,
                    "estimated_volume_cubic_meters",
                );
            }
        }
        missing
    }
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChainsawDetails {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub engine_displacement_cc: Option<u32>,
    #[serde(default)]
    pub guide_bar_length_inches: Option<u32>,
    #[serde(default)]
    pub date_of_acquisition: Option<String>,
    #[serde(default)]
    pub purpose: String,
}

/// Log transport verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CovDetails {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub number_of_pieces: u32,
    #[serde(default)]
    pub volume_cubic_meters: f64,
    #[serde(default)]
    pub vehicle_plate_number: String,
    #[serde(default)]
    pub transport_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlantationDetails {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub area_hectares: f64,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub number_of_trees: u32,
    #[serde(default)]
    pub year_planted: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TreeCuttingDetails {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub number_of_trees: u32,
    #[serde(default)]
    pub purpose: String,
    /// e.g. `private`, `public`, `alienable_and_disposable`.
    #[serde(default)]
    pub land_classification: Option<String>,
}

/// Shared by PLTP and SPLTP applications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimberDetails {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub area_hectares: f64,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub number_of_trees: u32,
    #[serde(default)]
    pub estimated_volume_cubic_meters: f64,
    #[serde(default)]
    pub purpose: Option<String>,
}
