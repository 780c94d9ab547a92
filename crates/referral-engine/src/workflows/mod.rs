pub mod leads;
pub mod referrals;
