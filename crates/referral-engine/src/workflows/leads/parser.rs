use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::workflows::referrals::{Buyer, NewReferral, OfferId, PartnerId, ReferralOrigin};

/// One parsed row of the marketplace checkout export, row number included so
/// import reporting can point at the offending line.
#[derive(Debug)]
pub(crate) struct LeadRecord {
    pub(crate) row: usize,
    pub(crate) referral: NewReferral,
}

#[derive(Debug, thiserror::Error)]
pub enum LeadParseError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {field} is required")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: '{value}' is not a valid {field}")]
    InvalidNumber {
        row: usize,
        field: &'static str,
        value: String,
    },
}

pub(crate) fn parse_leads<R: Read>(reader: R) -> Result<Vec<LeadRecord>, LeadParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<LeadRow>().enumerate() {
        // Header is line 1.
        let row = index + 2;
        let lead = record?;
        records.push(LeadRecord {
            row,
            referral: lead.into_new_referral(row)?,
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct LeadRow {
    #[serde(rename = "Offer ID")]
    offer_id: String,
    #[serde(rename = "Partner ID")]
    partner_id: String,
    #[serde(rename = "Buyer Company")]
    buyer_company: String,
    #[serde(rename = "Buyer Contact")]
    buyer_contact: String,
    #[serde(rename = "Success Fee Percent")]
    success_fee_percent: String,
    #[serde(rename = "Expected Value", default, deserialize_with = "empty_string_as_none")]
    expected_value: Option<String>,
}

impl LeadRow {
    fn into_new_referral(self, row: usize) -> Result<NewReferral, LeadParseError> {
        let required = |value: String, field: &'static str| {
            if value.trim().is_empty() {
                Err(LeadParseError::MissingField { row, field })
            } else {
                Ok(value)
            }
        };

        let percent = self.success_fee_percent.trim().parse::<u8>().map_err(|_| {
            LeadParseError::InvalidNumber {
                row,
                field: "success fee percent",
                value: self.success_fee_percent.clone(),
            }
        })?;

        let expected_value = self
            .expected_value
            .as_deref()
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| LeadParseError::InvalidNumber {
                        row,
                        field: "expected value",
                        value: raw.to_string(),
                    })
            })
            .transpose()?;

        Ok(NewReferral {
            offer_id: OfferId(required(self.offer_id, "offer id")?),
            partner_id: PartnerId(required(self.partner_id, "partner id")?),
            buyer: Buyer {
                company: required(self.buyer_company, "buyer company")?,
                contact: required(self.buyer_contact, "buyer contact")?,
            },
            // Checkout exports are marketplace leads by definition.
            origin: ReferralOrigin::Marketplace,
            success_fee_percent: percent,
            expected_value,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Offer ID,Partner ID,Buyer Company,Buyer Contact,Success Fee Percent,Expected Value
offer-erp,partner-acme,Padaria Estrela,Ana Souza,15,100000
offer-crm,partner-nimbus,Oficina Vulcano,Bruno Lima,10,
";

    #[test]
    fn parses_checkout_export() {
        let records = parse_leads(EXPORT.as_bytes()).expect("export parses");
        assert_eq!(records.len(), 2);

        let first = &records[0].referral;
        assert_eq!(first.offer_id.0, "offer-erp");
        assert_eq!(first.buyer.company, "Padaria Estrela");
        assert_eq!(first.success_fee_percent, 15);
        assert_eq!(first.expected_value, Some(100_000));
        assert_eq!(first.origin, ReferralOrigin::Marketplace);

        let second = &records[1].referral;
        assert_eq!(second.expected_value, None);
        assert_eq!(records[1].row, 3);
    }

    #[test]
    fn rejects_blank_partner() {
        let export = "\
Offer ID,Partner ID,Buyer Company,Buyer Contact,Success Fee Percent,Expected Value
offer-erp,,Padaria Estrela,Ana Souza,15,
";
        let err = parse_leads(export.as_bytes()).expect_err("blank partner rejected");
        assert!(matches!(
            err,
            LeadParseError::MissingField {
                row: 2,
                field: "partner id"
            }
        ));
    }

    #[test]
    fn rejects_non_numeric_percent() {
        let export = "\
Offer ID,Partner ID,Buyer Company,Buyer Contact,Success Fee Percent,Expected Value
offer-erp,partner-acme,Padaria Estrela,Ana Souza,fifteen,
";
        let err = parse_leads(export.as_bytes()).expect_err("bad percent rejected");
        assert!(matches!(err, LeadParseError::InvalidNumber { row: 2, .. }));
    }
}
