pub mod accounts;
pub mod briefing;
pub mod prioritization;
