use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub street_no: String,
    pub street_name: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl ParsedAddress {
    /// Nothing to put in the auditor's search form.
    pub fn is_unparseable(&self) -> bool {
        self.street_no.is_empty() && self.street_name.as_deref().unwrap_or_default().is_empty()
    }
}

impl Display for ParsedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} | {} {} {}",
            self.street_no,
            self.street_name.as_deref().unwrap_or("-"),
            self.city,
            self.state,
            self.zip
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameParts {
    pub first_name: String,
    pub last_name: String,
}

/// The columns of a permits export the enrichment phase reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecordRow {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Record Number")]
    pub record_number: String,
    #[serde(rename = "Record Type")]
    pub record_type: String,
    #[serde(rename = "Description")]
    pub description: String,
}

impl Display for RawRecordRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({})",
            self.record_number, self.address, self.record_type
        )
    }
}

/// Everything scraped for one permit record from the auditor site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDetail {
    pub record_number: String,
    pub description: String,
    pub property_city: String,
    pub property_state: String,
    pub property_zip_code: String,

    pub parcel_id: String,
    pub property_address: String,
    pub property_class: String,
    pub owner_names: Vec<String>,
    pub owner_names_string: String,
    pub mailing_address: String,
    pub contact_address: String,

    pub bedrooms: String,
    pub bathrooms: String,
    pub total_finished_area: String,
    pub year_built: String,
    pub transfer_date: String,
    pub transfer_price: String,

    // Rental contact sub-page
    pub owner_name: String,
    pub owner_business: String,
    pub title: String,
    pub address1: String,
    pub address2: String,
    pub rental_city: String,
    pub rental_state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub email_address: String,
}

impl Display for CaseDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ parcel {}", self.record_number, self.parcel_id)?;
        writeln!(f, "│  {}", self.property_address)?;
        if !self.owner_names.is_empty() {
            writeln!(f, "│  Owners: {}", self.owner_names_string)?;
        }
        write!(f, "└─ {}", self.description)
    }
}

/// One row of the final table: a detail record paired with one of its owners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRow {
    pub record_number: String,
    pub parcel: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "full name")]
    pub full_name: String,
    pub property_address: String,
    pub property_city: String,
    pub property_state: String,
    pub property_zip_code: String,
    pub description: String,
    pub mailing_address: String,
    pub mailing_city: String,
    pub mailing_state: String,
    pub mailing_zip: String,
    pub owner_name: String,
    pub owner_business: String,
    pub title: String,
    pub address_1: String,
    pub address_2: String,
    pub rental_city: String,
    pub rental_state: String,
    pub rental_zipcode: String,
    pub phone: String,
    pub email: String,
    pub bedroom: String,
    pub bathroom: String,
    #[serde(rename = "Tot Fin Area")]
    pub tot_fin_area: String,
    #[serde(rename = "year built")]
    pub year_built: String,
    #[serde(rename = "Property Class")]
    pub property_class: String,
    #[serde(rename = "Transfer Date")]
    pub transfer_date: String,
    #[serde(rename = "Transfer Price")]
    pub transfer_price: String,
}

impl OwnerRow {
    /// Cell values in [`OUTPUT_COLUMNS`] order.
    pub fn values(&self) -> [&str; 31] {
        [
            &self.record_number,
            &self.parcel,
            &self.first_name,
            &self.last_name,
            &self.full_name,
            &self.property_address,
            &self.property_city,
            &self.property_state,
            &self.property_zip_code,
            &self.description,
            &self.mailing_address,
            &self.mailing_city,
            &self.mailing_state,
            &self.mailing_zip,
            &self.owner_name,
            &self.owner_business,
            &self.title,
            &self.address_1,
            &self.address_2,
            &self.rental_city,
            &self.rental_state,
            &self.rental_zipcode,
            &self.phone,
            &self.email,
            &self.bedroom,
            &self.bathroom,
            &self.tot_fin_area,
            &self.year_built,
            &self.property_class,
            &self.transfer_date,
            &self.transfer_price,
        ]
    }
}

/// Header of the final table, in column order.
pub const OUTPUT_COLUMNS: [&str; 31] = [
    "record_number",
    "parcel",
    "first_name",
    "last_name",
    "full name",
    "property_address",
    "property_city",
    "property_state",
    "property_zip_code",
    "description",
    "mailing_address",
    "mailing_city",
    "mailing_state",
    "mailing_zip",
    "owner_name",
    "owner_business",
    "title",
    "address_1",
    "address_2",
    "rental_city",
    "rental_state",
    "rental_zipcode",
    "phone",
    "email",
    "bedroom",
    "bathroom",
    "Tot Fin Area",
    "year built",
    "Property Class",
    "Transfer Date",
    "Transfer Price",
];
