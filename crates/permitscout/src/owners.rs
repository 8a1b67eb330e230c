use crate::names::split_full_name;
use crate::types::{CaseDetail, OwnerRow};

/// City, state and zip read positionally from the contact address.
fn mailing_parts(contact_address: &str) -> (String, String, String) {
    let parts: Vec<&str> = contact_address.split_whitespace().collect();
    let part = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();
    (part(0), part(1), part(2))
}

fn shared_row(detail: &CaseDetail) -> OwnerRow {
    OwnerRow {
        record_number: detail.record_number.clone(),
        parcel: detail.parcel_id.clone(),
        property_address: detail.property_address.clone(),
        property_city: detail.property_city.clone(),
        property_state: detail.property_state.clone(),
        property_zip_code: detail.property_zip_code.clone(),
        description: detail.description.clone(),
        mailing_address: detail.mailing_address.clone(),
        owner_name: detail.owner_name.clone(),
        owner_business: detail.owner_business.clone(),
        title: detail.title.clone(),
        address_1: detail.address1.clone(),
        address_2: detail.address2.clone(),
        rental_city: detail.rental_city.clone(),
        rental_state: detail.rental_state.clone(),
        rental_zipcode: detail.zip_code.clone(),
        phone: detail.phone_number.clone(),
        email: detail.email_address.clone(),
        bedroom: detail.bedrooms.clone(),
        bathroom: detail.bathrooms.clone(),
        tot_fin_area: detail.total_finished_area.clone(),
        year_built: detail.year_built.clone(),
        property_class: detail.property_class.clone(),
        transfer_date: detail.transfer_date.clone(),
        transfer_price: detail.transfer_price.clone(),
        ..Default::default()
    }
}

/// One row per non-blank owner, or a single row with blank name fields when
/// there is none.
pub fn expand_owners(detail: &CaseDetail) -> Vec<OwnerRow> {
    let owners: Vec<&str> = detail
        .owner_names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();

    if owners.is_empty() {
        log::debug!(
            "No owner for {}, writing property data only",
            detail.record_number
        );
        return vec![shared_row(detail)];
    }

    let (mailing_city, mailing_state, mailing_zip) = mailing_parts(&detail.contact_address);

    owners
        .into_iter()
        .map(|owner| {
            log::debug!("Processing owner: {owner}");
            let name = split_full_name(owner);
            OwnerRow {
                first_name: name.first_name,
                last_name: name.last_name,
                full_name: owner.to_string(),
                mailing_city: mailing_city.clone(),
                mailing_state: mailing_state.clone(),
                mailing_zip: mailing_zip.clone(),
                ..shared_row(detail)
            }
        })
        .collect()
}
