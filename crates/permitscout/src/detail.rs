use std::fmt::Display;

use tokio::time::sleep;

use crate::actions::{click_element, click_when_clickable, fill_input};
use crate::address::parse_address;
use crate::browser::{Browser, BrowserError, ErrorKind, Locator};
use crate::config::Timeouts;
use crate::types::{CaseDetail, ParsedAddress, RawRecordRow};
use crate::wait::Wait;

pub const STREET_NUMBER_INPUT: Locator = Locator::xpath_static(r#"//input[@id="inpNumber"]"#);
pub const STREET_NAME_INPUT: Locator = Locator::xpath_static(r#"//input[@id="inpStreet"]"#);
pub const SEARCH_BUTTON: Locator = Locator::xpath_static(r#"//button[@id="btSearch"]"#);
pub const NO_RECORDS_MESSAGE: Locator = Locator::xpath_static(
    r#"//large[contains(text(), "Your search did not find any records")]"#,
);
pub const FIRST_RESULT_ROW: Locator =
    Locator::xpath_static(r#"(//table[@id="searchResults"]/tbody/tr)[1]"#);
pub const PARCEL_HEADER: Locator = Locator::xpath_static(r#"//td[@class="DataletHeaderTopLeft"]"#);
pub const OWNER_LINKS: Locator =
    Locator::xpath_static(r#"//tr[td[contains(text(), "Owner")]]/td[@class="DataletData"]/a"#);
pub const RENTAL_CONTACT_BUTTON: Locator =
    Locator::xpath_static(r#"//a[span[contains(text(), "Rental Contact")]]"#);

/// The data cell of the datalet row whose label contains `label`.
pub fn labeled(label: &str) -> Locator {
    Locator::xpath(format!(
        r#"//tr[td[contains(text(), "{label}")]]/td[@class="DataletData"]"#
    ))
}

/// The `n`th cell (1-based) of the dwelling data table.
pub fn dwelling_cell(n: usize) -> Locator {
    Locator::xpath(format!(r#"(//table[@id="Dwelling Data"]//td)[{n}]"#))
}

/// How a located cell's text becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `Label: VALUE` cells; everything after the first colon.
    AfterColon,
}

impl FieldKind {
    pub fn apply(self, text: &str) -> String {
        match self {
            FieldKind::Text => text.trim().to_string(),
            FieldKind::AfterColon => match text.split_once(':') {
                Some((_, value)) => value.trim().to_string(),
                None => text.trim().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    ParcelId,
    PropertyAddress,
    PropertyClass,
    MailingAddress,
    ContactAddress,
    Bedrooms,
    Bathrooms,
    TotalFinishedArea,
    YearBuilt,
    TransferDate,
    TransferPrice,
    OwnerName,
    OwnerBusiness,
    Title,
    Address1,
    Address2,
    RentalCity,
    RentalState,
    ZipCode,
    PhoneNumber,
    EmailAddress,
}

impl DetailField {
    fn slot(self, detail: &mut CaseDetail) -> &mut String {
        match self {
            DetailField::ParcelId => &mut detail.parcel_id,
            DetailField::PropertyAddress => &mut detail.property_address,
            DetailField::PropertyClass => &mut detail.property_class,
            DetailField::MailingAddress => &mut detail.mailing_address,
            DetailField::ContactAddress => &mut detail.contact_address,
            DetailField::Bedrooms => &mut detail.bedrooms,
            DetailField::Bathrooms => &mut detail.bathrooms,
            DetailField::TotalFinishedArea => &mut detail.total_finished_area,
            DetailField::YearBuilt => &mut detail.year_built,
            DetailField::TransferDate => &mut detail.transfer_date,
            DetailField::TransferPrice => &mut detail.transfer_price,
            DetailField::OwnerName => &mut detail.owner_name,
            DetailField::OwnerBusiness => &mut detail.owner_business,
            DetailField::Title => &mut detail.title,
            DetailField::Address1 => &mut detail.address1,
            DetailField::Address2 => &mut detail.address2,
            DetailField::RentalCity => &mut detail.rental_city,
            DetailField::RentalState => &mut detail.rental_state,
            DetailField::ZipCode => &mut detail.zip_code,
            DetailField::PhoneNumber => &mut detail.phone_number,
            DetailField::EmailAddress => &mut detail.email_address,
        }
    }
}

impl Display for DetailField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetailField::ParcelId => "Parcel ID",
            DetailField::PropertyAddress => "Property Address",
            DetailField::PropertyClass => "Property Class",
            DetailField::MailingAddress => "Mailing Address",
            DetailField::ContactAddress => "Contact Address",
            DetailField::Bedrooms => "Bedrooms",
            DetailField::Bathrooms => "Bathrooms",
            DetailField::TotalFinishedArea => "Tot Fin Area",
            DetailField::YearBuilt => "Year built",
            DetailField::TransferDate => "Transfer Date",
            DetailField::TransferPrice => "Transfer Price",
            DetailField::OwnerName => "Owner Name",
            DetailField::OwnerBusiness => "Owner Business",
            DetailField::Title => "Title",
            DetailField::Address1 => "Address1",
            DetailField::Address2 => "Address2",
            DetailField::RentalCity => "Rental City",
            DetailField::RentalState => "Rental State",
            DetailField::ZipCode => "Zip Code",
            DetailField::PhoneNumber => "Phone Number",
            DetailField::EmailAddress => "E-Mail Address",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub locator: Locator,
    pub field: DetailField,
    pub kind: FieldKind,
}

impl FieldSpec {
    fn text(locator: Locator, field: DetailField) -> Self {
        Self {
            locator,
            field,
            kind: FieldKind::Text,
        }
    }
}

/// Owners are read once this many parcel-page fields are in.
pub const OWNERS_AFTER: usize = 3;

/// Fields read from the parcel page, in page order.
pub fn main_page_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            locator: PARCEL_HEADER,
            field: DetailField::ParcelId,
            kind: FieldKind::AfterColon,
        },
        FieldSpec::text(labeled("Site (Property) Address"), DetailField::PropertyAddress),
        FieldSpec::text(labeled("Property Class"), DetailField::PropertyClass),
        FieldSpec::text(labeled("Owner Mailing /"), DetailField::MailingAddress),
        FieldSpec::text(labeled("Contact Address"), DetailField::ContactAddress),
        FieldSpec::text(dwelling_cell(10), DetailField::Bedrooms),
        FieldSpec::text(dwelling_cell(11), DetailField::Bathrooms),
        FieldSpec::text(dwelling_cell(8), DetailField::TotalFinishedArea),
        FieldSpec::text(dwelling_cell(7), DetailField::YearBuilt),
        FieldSpec::text(labeled("Transfer Date"), DetailField::TransferDate),
        FieldSpec::text(labeled("Transfer Price"), DetailField::TransferPrice),
    ]
}

const RENTAL_HEADERS: [(&str, DetailField); 10] = [
    ("Owner Name:", DetailField::OwnerName),
    ("Owner Business:", DetailField::OwnerBusiness),
    ("Title:", DetailField::Title),
    ("Address1:", DetailField::Address1),
    ("Address2:", DetailField::Address2),
    ("City:", DetailField::RentalCity),
    ("State:", DetailField::RentalState),
    ("Zip Code:", DetailField::ZipCode),
    ("Phone Number:", DetailField::PhoneNumber),
    ("E-Mail Address:", DetailField::EmailAddress),
];

/// Fields read from the rental contact sub-page.
pub fn rental_fields() -> Vec<FieldSpec> {
    RENTAL_HEADERS
        .iter()
        .map(|(header, field)| FieldSpec::text(labeled(header), *field))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailState {
    AddressParsed,
    FormSubmitted,
    NoRecord,
    RecordOpened,
    FieldsExtracted,
    RentalPageVisited,
}

impl Display for DetailState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetailState::AddressParsed => "address parsed",
            DetailState::FormSubmitted => "form submitted",
            DetailState::NoRecord => "no record",
            DetailState::RecordOpened => "record opened",
            DetailState::FieldsExtracted => "fields extracted",
            DetailState::RentalPageVisited => "rental page visited",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    /// The address gave nothing to search for; the browser was not touched.
    Skipped,
    /// The auditor has no parcel for the address. Carries the identifying fields only.
    NoRecord(CaseDetail),
    Found(CaseDetail),
    /// Something unexpected broke the lookup; there is no usable data.
    Failed(String),
}

impl DetailOutcome {
    /// The detail to fan out, if there is one.
    pub fn into_detail(self) -> Option<CaseDetail> {
        match self {
            DetailOutcome::NoRecord(detail) | DetailOutcome::Found(detail) => Some(detail),
            DetailOutcome::Skipped | DetailOutcome::Failed(_) => None,
        }
    }
}

fn identity(record: &RawRecordRow, address: &ParsedAddress) -> CaseDetail {
    CaseDetail {
        record_number: record.record_number.clone(),
        description: record.description.clone(),
        property_city: address.city.clone(),
        property_state: address.state.clone(),
        property_zip_code: address.zip.clone(),
        ..Default::default()
    }
}

/// Missing or vanished elements leave a field empty instead of failing the record.
fn tolerated(err: &BrowserError) -> bool {
    err.is_absent() || err.kind() == ErrorKind::Stale
}

/// Looks one permit record up on the auditor's address search, which the
/// browser must already be showing.
pub struct DetailScraper<'a, B: Browser> {
    browser: &'a mut B,
    timeouts: &'a Timeouts,
}

impl<'a, B: Browser> DetailScraper<'a, B> {
    pub fn new(browser: &'a mut B, timeouts: &'a Timeouts) -> Self {
        Self { browser, timeouts }
    }

    pub async fn scrape(&mut self, record: &RawRecordRow) -> DetailOutcome {
        let address = parse_address(&record.address);
        if address.is_unparseable() {
            log::warn!("Skipping {record}: unparseable address");
            return DetailOutcome::Skipped;
        }
        log::debug!("{}: {} ({address})", record.record_number, DetailState::AddressParsed);

        match self.lookup(record, &address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("An error occurred while searching for {}: {e}", record.address);
                DetailOutcome::Failed(e.to_string())
            }
        }
    }

    async fn lookup(
        &mut self,
        record: &RawRecordRow,
        address: &ParsedAddress,
    ) -> Result<DetailOutcome, BrowserError> {
        let id = &record.record_number;
        let presence = Wait::at_most(self.timeouts.presence);

        fill_input(
            self.browser,
            &STREET_NUMBER_INPUT,
            &address.street_no,
            "Street Number",
            presence,
        )
        .await?;
        fill_input(
            self.browser,
            &STREET_NAME_INPUT,
            address.street_name.as_deref().unwrap_or_default(),
            "Street Name",
            presence,
        )
        .await?;

        click_when_clickable(self.browser, &SEARCH_BUTTON, presence)
            .await
            .inspect_err(|e| log::error!("Search button not usable: {e}"))?;
        log::info!("Clicked the Search Button");
        sleep(self.timeouts.settle).await;
        log::debug!("{id}: {}", DetailState::FormSubmitted);

        match Wait::at_most(self.timeouts.no_records)
            .for_presence(self.browser, &NO_RECORDS_MESSAGE)
            .await
        {
            Ok(_) => {
                log::info!("{id}: {}", DetailState::NoRecord);
                return Ok(DetailOutcome::NoRecord(identity(record, address)));
            }
            Err(e) if e.is_absent() => log::info!("Records found. Continuing..."),
            Err(e) => return Err(e),
        }

        match Wait::at_most(self.timeouts.results_row)
            .for_presence(self.browser, &FIRST_RESULT_ROW)
            .await
        {
            Ok(row) => {
                click_element(self.browser, Some(&row)).await?;
                log::debug!("{id}: {}", DetailState::RecordOpened);
            }
            // The search sometimes lands straight on the parcel page
            Err(e) if e.is_absent() => log::warn!("Search results timed out"),
            Err(e) => return Err(e),
        }

        let mut detail = identity(record, address);
        let fields = main_page_fields();
        let (header, rest) = fields.split_at(OWNERS_AFTER);
        for entry in header {
            self.extract(entry, &mut detail).await?;
        }
        detail.owner_names = self.owner_names().await?;
        detail.owner_names_string = detail.owner_names.join(", ");
        for entry in rest {
            self.extract(entry, &mut detail).await?;
        }
        log::debug!("{id}: {}", DetailState::FieldsExtracted);

        match Wait::at_most(self.timeouts.rental_button)
            .for_clickable(self.browser, &RENTAL_CONTACT_BUTTON)
            .await
        {
            Ok(button) => {
                click_element(self.browser, Some(&button)).await?;
                log::info!("Navigating to Rental Contact page...");
                sleep(self.timeouts.settle).await;
            }
            Err(e) if e.is_absent() => log::info!("Rental Contact button not found"),
            Err(e) => return Err(e),
        }
        for entry in rental_fields() {
            self.extract(&entry, &mut detail).await?;
        }
        log::debug!("{id}: {}", DetailState::RentalPageVisited);

        Ok(DetailOutcome::Found(detail))
    }

    async fn extract(&mut self, entry: &FieldSpec, detail: &mut CaseDetail) -> Result<(), BrowserError> {
        let found = async {
            let element = Wait::at_most(self.timeouts.field)
                .for_presence(self.browser, &entry.locator)
                .await?;
            self.browser.text(&element).await
        }
        .await;

        let value = match found {
            Ok(text) => {
                let value = entry.kind.apply(&text);
                log::debug!("{}: {value}", entry.field);
                value
            }
            Err(e) if tolerated(&e) => {
                log::debug!("{} not found", entry.field);
                String::new()
            }
            Err(e) => return Err(e),
        };
        *entry.field.slot(detail) = value;
        Ok(())
    }

    async fn owner_names(&mut self) -> Result<Vec<String>, BrowserError> {
        let links = match Wait::at_most(self.timeouts.owners)
            .for_all_present(self.browser, &OWNER_LINKS)
            .await
        {
            Ok(links) => links,
            Err(e) if tolerated(&e) => {
                log::info!("Owner Names not found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut names = Vec::with_capacity(links.len());
        for link in &links {
            match self.browser.text(link).await {
                Ok(text) if !text.trim().is_empty() => names.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) if tolerated(&e) => {}
                Err(e) => return Err(e),
            }
        }
        log::info!("Owner Names: {names:?}");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, FakePage, test_config};

    fn record(address: &str) -> RawRecordRow {
        RawRecordRow {
            address: address.to_string(),
            record_number: "R-100".to_string(),
            record_type: "Rental Registration".to_string(),
            description: "New rental".to_string(),
        }
    }

    fn search_form() -> FakeBrowser {
        let mut browser = FakeBrowser::new();
        browser.page.add(STREET_NUMBER_INPUT, "");
        browser.page.add(STREET_NAME_INPUT, "");
        browser.page.add(SEARCH_BUTTON, "Search");
        browser
    }

    fn parcel_page(page: &mut FakePage) {
        page.clear();
        page.add(PARCEL_HEADER, "Parcel ID: 010-123456 ");
        page.add(labeled("Site (Property) Address"), " 123 THIRD ST ");
        page.add(labeled("Property Class"), "R - Residential");
        page.add(labeled("Contact Address"), "COLUMBUS OH 43215");
        page.add(dwelling_cell(10), "3");
        page.add(dwelling_cell(11), "2");
        page.add(labeled("Transfer Date"), "01/05/2020");
        page.add(OWNER_LINKS, "DOE JANE");
        page.add(OWNER_LINKS, " ");
        page.add(OWNER_LINKS, "ACME HOLDINGS LLC");
    }

    fn rental_page(page: &mut FakePage) {
        page.clear();
        page.add(labeled("Owner Name:"), "Jane Doe");
        page.add(labeled("City:"), "Columbus");
        page.add(labeled("E-Mail Address:"), "jane@example.com");
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(FieldKind::Text.apply("  3 "), "3");
        assert_eq!(FieldKind::AfterColon.apply("Parcel ID: 010-1"), "010-1");
        assert_eq!(FieldKind::AfterColon.apply("Parcel: A:B"), "A:B");
        assert_eq!(FieldKind::AfterColon.apply(" 010-1 "), "010-1");
    }

    #[test]
    fn test_field_tables() {
        let main = main_page_fields();
        assert_eq!(main.len(), 11);
        assert_eq!(main[0].kind, FieldKind::AfterColon);
        assert!(main[1..].iter().all(|f| f.kind == FieldKind::Text));
        assert_eq!(main[OWNERS_AFTER - 1].field, DetailField::PropertyClass);

        let rental = rental_fields();
        assert_eq!(rental.len(), 10);
        assert_eq!(rental[5].field, DetailField::RentalCity);
        assert_eq!(rental[5].locator, labeled("City:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_address_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = search_form();

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("NoStreetNumber"))
            .await;

        assert_eq!(outcome, DetailOutcome::Skipped);
        assert!(browser.events().is_empty(), "no browser interaction");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_record_keeps_identity_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = search_form();
        browser.on_click(SEARCH_BUTTON, |page| {
            page.add(NO_RECORDS_MESSAGE, "Your search did not find any records");
        });

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("123 3RD ST, Columbus OH 43215"))
            .await;

        let DetailOutcome::NoRecord(detail) = outcome else {
            panic!("expected no record, got {outcome:?}");
        };
        assert_eq!(detail.record_number, "R-100");
        assert_eq!(detail.description, "New rental");
        assert_eq!(detail.property_city, "Columbus");
        assert_eq!(detail.property_state, "OH");
        assert_eq!(detail.property_zip_code, "43215");
        assert_eq!(detail.parcel_id, "");

        assert!(
            browser
                .events()
                .contains(&format!("type {STREET_NUMBER_INPUT}=123"))
        );
        assert!(
            browser
                .events()
                .contains(&format!("type {STREET_NAME_INPUT}=Third"))
        );
        assert_eq!(browser.clicked(&FIRST_RESULT_ROW), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_record_with_rental_contact() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = search_form();
        browser.on_click(SEARCH_BUTTON, |page| {
            page.add(FIRST_RESULT_ROW, "010-123456 DOE JANE");
        });
        browser.on_click(FIRST_RESULT_ROW, |page| {
            parcel_page(page);
            page.add(RENTAL_CONTACT_BUTTON, "Rental Contact");
        });
        browser.on_click(RENTAL_CONTACT_BUTTON, rental_page);

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("123 3RD ST, Columbus OH 43215"))
            .await;

        let DetailOutcome::Found(detail) = outcome else {
            panic!("expected a found record, got {outcome:?}");
        };
        assert_eq!(detail.parcel_id, "010-123456");
        assert_eq!(detail.property_address, "123 THIRD ST");
        assert_eq!(detail.property_class, "R - Residential");
        assert_eq!(detail.contact_address, "COLUMBUS OH 43215");
        assert_eq!(detail.bedrooms, "3");
        assert_eq!(detail.bathrooms, "2");
        assert_eq!(detail.transfer_date, "01/05/2020");
        assert_eq!(detail.transfer_price, "", "missing field is left empty");
        assert_eq!(detail.owner_names, vec!["DOE JANE", "ACME HOLDINGS LLC"]);
        assert_eq!(detail.owner_names_string, "DOE JANE, ACME HOLDINGS LLC");

        assert_eq!(detail.owner_name, "Jane Doe");
        assert_eq!(detail.rental_city, "Columbus");
        assert_eq!(detail.email_address, "jane@example.com");
        assert_eq!(detail.phone_number, "");
        assert_eq!(detail.record_number, "R-100");
        assert_eq!(detail.property_zip_code, "43215");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_rental_button_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = search_form();
        browser.on_click(SEARCH_BUTTON, |page| {
            page.add(FIRST_RESULT_ROW, "010-123456");
        });
        browser.on_click(FIRST_RESULT_ROW, parcel_page);

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("123 3RD ST, Columbus OH 43215"))
            .await;

        let DetailOutcome::Found(detail) = outcome else {
            panic!("expected a found record, got {outcome:?}");
        };
        assert_eq!(detail.parcel_id, "010-123456");
        assert_eq!(detail.owner_name, "");
        assert_eq!(detail.rental_city, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_owners_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = search_form();
        browser.on_click(SEARCH_BUTTON, |page| {
            page.clear();
            page.add(PARCEL_HEADER, "Parcel ID: 010-9");
        });

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("9 MAIN ST, Columbus OH 43215"))
            .await;

        let detail = outcome.into_detail().expect("record found");
        assert_eq!(detail.parcel_id, "010-9");
        assert!(detail.owner_names.is_empty());
        assert_eq!(detail.owner_names_string, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_search_button_fails_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut browser = FakeBrowser::new();
        browser.page.add(STREET_NUMBER_INPUT, "");
        browser.page.add(STREET_NAME_INPUT, "");

        let outcome = DetailScraper::new(&mut browser, &config.timeouts)
            .scrape(&record("123 3RD ST, Columbus OH 43215"))
            .await;

        assert!(matches!(outcome, DetailOutcome::Failed(_)));
        assert_eq!(outcome.into_detail(), None);
    }
}
