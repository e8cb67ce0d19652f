// 🌱 Campus Seed - the fixed parcel set loaded once at onboarding
//
// 21 parcels whose square footage sums to the campus total of 672,718 SF.
// Delinquent parcels accrue from the start of the historic rate period.

use chrono::NaiveDate;

use crate::entities::{EnforcementStep, Parcel, ParcelStatus};

/// First day of the historic rate period; arrears for seeded non-payers run from here
pub fn accrual_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 1).unwrap_or_default()
}

struct SeedRow {
    address: &'static str,
    business: &'static str,
    sqft: u32,
    status: ParcelStatus,
    entity_owner: &'static str,
    corporate_target: &'static str,
    step: EnforcementStep,
    next_action: &'static str,
    deadline: Option<(i32, u32, u32)>,
    past_due: f64,
    billed_weekly: Option<f64>,
    notes: &'static str,
}

const fn paying(
    address: &'static str,
    business: &'static str,
    sqft: u32,
    entity_owner: &'static str,
    corporate_target: &'static str,
    notes: &'static str,
) -> SeedRow {
    SeedRow {
        address,
        business,
        sqft,
        status: ParcelStatus::Current,
        entity_owner,
        corporate_target,
        step: EnforcementStep::Paying,
        next_action: "",
        deadline: None,
        past_due: 0.0,
        billed_weekly: None,
        notes,
    }
}

const SEED: [SeedRow; 21] = [
    // CURRENT (paying)
    paying("6500 Kirby Gate Blvd", "Waters of Memphis (Apts)", 54_424, "Kirby Gate Apts LLC", "", ""),
    paying("2809 Kirby Pkwy", "Shoppes at Kirby", 22_350, "WFC", "", ""),
    paying("2857 Kirby Pkwy", "Shops at Kirby Gate", 20_000, "WFC", "", ""),
    paying("2865 Kirby Pkwy", "Kirby Wines & Spirits", 5_500, "WFC", "", ""),
    paying("2873 Kirby Pkwy", "Nail Salon / Retail", 4_200, "WFC", "", ""),
    paying("6535 Kirby Gate Blvd", "Summit Medical (Bldg A)", 72_000, "Summit Healthcare REIT", "", "Verify: may be partial"),
    paying("6655 Quince Rd", "Willow Grove Apts", 72_400, "Willow Grove LP", "", "Listed current in case summary"),
    paying("6660 Quince Rd", "Kroger #445", 65_000, "Kroger Co.", "Cincinnati HQ", ""),
    paying("2725 Kirby Pkwy", "FedEx Office / Retail", 18_000, "Kirby Pkwy Retail LLC", "", ""),
    // DELINQUENT (non-paying)
    SeedRow {
        address: "6420 Quince Rd",
        business: "Summit of Germantown",
        sqft: 127_760,
        status: ParcelStatus::Delinquent,
        entity_owner: "Summit Healthcare REIT",
        corporate_target: "Memphis Senior Housing Propco K6 LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 302_611.70,
        billed_weekly: Some(2_876.40),
        notes: "Largest single target; SF carries the campus residual pending survey",
    },
    SeedRow {
        address: "2835 Kirby Pkwy",
        business: "Kroger",
        sqft: 58_592,
        status: ParcelStatus::Delinquent,
        entity_owner: "Kroger Co. - Delta Division",
        corporate_target: "Kroger Limited Partnership I, Property Tax Dept",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 82_470.21,
        billed_weekly: Some(783.90),
        notes: "Delta Division HQ is local Memphis",
    },
    SeedRow {
        address: "6480 Quince Rd",
        business: "Pointe at Kirby (MedHCP)",
        sqft: 31_061,
        status: ParcelStatus::Delinquent,
        entity_owner: "Grace Mgmt / MedHCP REIT",
        corporate_target: "6480 Quince Road East Holdings LLC",
        step: EnforcementStep::DemandSent,
        next_action: "Follow-up / Lien Warning",
        deadline: Some((2026, 3, 1)),
        past_due: 43_744.24,
        billed_weekly: Some(415.80),
        notes: "Large parcel, high-value target",
    },
    SeedRow {
        address: "6500 Quince Rd",
        business: "Freedom Plasma Center",
        sqft: 12_314,
        status: ParcelStatus::Delinquent,
        entity_owner: "Realty Income Corp (NYSE: O)",
        corporate_target: "Realty Income Properties 25 LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 17_327.27,
        billed_weekly: Some(164.70),
        notes: "Public REIT - will settle to avoid headline",
    },
    SeedRow {
        address: "6532 Kirby Gate Blvd",
        business: "Dollar Tree #12847",
        sqft: 9_964,
        status: ParcelStatus::Delinquent,
        entity_owner: "Dollar Tree Inc.",
        corporate_target: "DT Retail Properties LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 14_013.31,
        billed_weekly: Some(133.20),
        notes: "Corporate tenant, standard collections",
    },
    SeedRow {
        address: "6659 Quince Rd",
        business: "Dollar General #22748",
        sqft: 9_301,
        status: ParcelStatus::Delinquent,
        entity_owner: "Dollar General Corp.",
        corporate_target: "DG Memphis LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 13_066.46,
        billed_weekly: Some(124.20),
        notes: "Corporate tenant, standard collections",
    },
    SeedRow {
        address: "2801 Kirby Pkwy",
        business: "Starbucks (Exline prop)",
        sqft: 7_493,
        status: ParcelStatus::Delinquent,
        entity_owner: "Exline Properties",
        corporate_target: "Kristovich Trust",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 10_509.98,
        billed_weekly: Some(99.90),
        notes: "Landlord = Exline; Starbucks = subtenant",
    },
    SeedRow {
        address: "2845 Kirby Pkwy",
        business: "Wendy's (Carlisle/Wendelta)",
        sqft: 3_284,
        status: ParcelStatus::Delinquent,
        entity_owner: "Wendelta Inc. / Carlisle Corp",
        corporate_target: "Arline Townhomes LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 4_639.54,
        billed_weekly: Some(44.10),
        notes: "Franchisee entity",
    },
    SeedRow {
        address: "2735 Kirby Pkwy",
        business: "Dunkin' (JP Foods LLC)",
        sqft: 2_375,
        status: ParcelStatus::Delinquent,
        entity_owner: "JP Foods LLC",
        corporate_target: "Kirby Land Holdings LLC",
        step: EnforcementStep::DemandDrafted,
        next_action: "Send certified demand",
        deadline: Some((2026, 2, 28)),
        past_due: 3_408.64,
        billed_weekly: Some(32.40),
        notes: "Local franchisee - smallest parcel",
    },
    // RECON
    SeedRow {
        address: "2715 Kirby Pkwy",
        business: "KG Business Center",
        sqft: 43_200,
        status: ParcelStatus::Recon,
        entity_owner: "Unknown - research needed",
        corporate_target: "3LS Properties Inc",
        step: EnforcementStep::Research,
        next_action: "Identify entity & send demand",
        deadline: Some((2026, 2, 28)),
        past_due: 0.0,
        billed_weekly: Some(577.80),
        notes: "Non-payer, past due TBD",
    },
    // DISPUTED
    SeedRow {
        address: "6635 Quince Rd",
        business: "GALR Properties",
        sqft: 28_500,
        status: ParcelStatus::Disputed,
        entity_owner: "GALR LP",
        corporate_target: "GALR LP - counsel of record",
        step: EnforcementStep::AttorneyLetterReceived,
        next_action: "Counsel response",
        deadline: Some((2026, 3, 15)),
        past_due: 0.0,
        billed_weekly: None,
        notes: "Dispute letter raised service quality",
    },
    // VERIFY
    SeedRow {
        address: "2966 Kirby Rd",
        business: "Car Wash (GX18)",
        sqft: 5_000,
        status: ParcelStatus::Verify,
        entity_owner: "Unknown",
        corporate_target: "TBD",
        step: EnforcementStep::Research,
        next_action: "Verify if on security rolls",
        deadline: Some((2026, 3, 1)),
        past_due: 0.0,
        billed_weekly: None,
        notes: "May not be a covenant parcel",
    },
];

/// The full campus, ids 1..=21 in seed order
pub fn campus_parcels() -> Vec<Parcel> {
    SEED.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut parcel = Parcel::new(
                i as i64 + 1,
                row.address,
                row.business,
                row.sqft,
                row.status,
            )
            .with_parties(row.entity_owner, row.corporate_target)
            .with_past_due(row.past_due);

            parcel.enforcement_step = row.step;
            parcel.billed_weekly_rate = row.billed_weekly;
            if !row.next_action.is_empty() {
                parcel.next_action = Some(row.next_action.to_string());
            }
            parcel.next_action_deadline = row
                .deadline
                .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
            if !row.notes.is_empty() {
                parcel.notes = Some(row.notes.to_string());
            }
            if matches!(
                row.status,
                ParcelStatus::Delinquent | ParcelStatus::Disputed | ParcelStatus::Recon
            ) {
                parcel.delinquent_since = Some(accrual_start());
            }
            parcel
        })
        .collect()
}
