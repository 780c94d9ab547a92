use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use referral_engine::error::AppError;
use referral_engine::workflows::leads::import_leads;
use referral_engine::workflows::referrals::{
    Buyer, NewReferral, OfferId, PartnerId, Referral, ReferralOrigin, ReferralService,
    ReferralSettings, ReferralStatus,
};

use crate::infra::{
    AppReferralService, InMemoryReferralStore, LoggingAuditLog, LoggingNotifier, SeededCatalog,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional marketplace checkout CSV export to import as leads.
    #[arg(long)]
    pub(crate) leads_csv: Option<PathBuf>,
    /// Override the follow-up staleness threshold in days.
    #[arg(long)]
    pub(crate) follow_up_days: Option<i64>,
}

/// Scripted walkthrough of the referral lifecycle against the in-memory
/// adapters, with the clock rewound so the SLA scan and follow-up alerts
/// have something to report.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        leads_csv,
        follow_up_days,
    } = args;

    let notifier = Arc::new(LoggingNotifier::default());
    let service = Arc::new(ReferralService::new(
        Arc::new(InMemoryReferralStore::default()),
        Arc::new(SeededCatalog::demo()),
        notifier.clone(),
        Arc::new(LoggingAuditLog),
        ReferralSettings::default(),
    ));

    let now = Utc::now();
    let routed_at = now - Duration::days(10);

    println!("Referral settlement demo");
    println!(
        "Routing three marketplace referrals as of {}",
        routed_at.format("%Y-%m-%d %H:%M UTC")
    );

    let won = create_or_report(
        &service,
        demo_referral("offer-erp", "partner-acme", "Volt Industria", 15, Some(120_000)),
        routed_at,
    );
    let stale = create_or_report(
        &service,
        demo_referral("offer-crm", "partner-nimbus", "Braga Foods", 10, None),
        routed_at,
    );
    // Never acknowledged; the scan below flips it to overdue.
    create_or_report(
        &service,
        demo_referral("offer-fiscal", "partner-acme", "Horizonte Log", 12, Some(80_000)),
        routed_at,
    );

    if let Some(referral) = won {
        walk_to_settlement(&service, &referral, routed_at);
    }
    if let Some(referral) = stale {
        if let Err(err) = service.update_status(
            &referral.id,
            ReferralStatus::Acked,
            None,
            "demo-manager",
            routed_at + Duration::hours(4),
        ) {
            println!("  Acknowledgment rejected: {}", err);
        }
    }

    let outcome = match leads_csv {
        Some(path) => import_leads(&service, File::open(path)?, now)?,
        None => import_leads(&service, SAMPLE_EXPORT.as_bytes(), now)?,
    };
    println!(
        "\nLead import: {} created, {} rejected",
        outcome.created.len(),
        outcome.rejected.len()
    );
    for (row, reason) in &outcome.rejected {
        println!("  - row {}: {}", row, reason);
    }

    println!("\nRunning SLA scan as of now");
    match service.run_sla_scan(now) {
        Ok(outcome) => println!(
            "  {} sent referrals checked, {} flipped to overdue",
            outcome.checked, outcome.updated
        ),
        Err(err) => println!("  Scan unavailable: {}", err),
    }

    match service.statistics(None) {
        Ok(stats) => {
            println!("\nPipeline statistics");
            println!("- {} referrals tracked", stats.total);
            for entry in &stats.by_status {
                if entry.count > 0 {
                    println!("  - {}: {}", entry.status_label, entry.count);
                }
            }
            println!("- Conversion rate: {}%", stats.conversion_rate_percent);
            println!(
                "- Expected value {} | expected fees {}",
                stats.expected_value_total, stats.expected_fee_total
            );
            println!(
                "- Won value {} | realized fees {}",
                stats.won_value_total, stats.realized_fee_total
            );
        }
        Err(err) => println!("\nStatistics unavailable: {}", err),
    }

    match service.follow_up_alerts(follow_up_days, now) {
        Ok(alerts) if alerts.is_empty() => println!("\nFollow-up alerts: none"),
        Ok(alerts) => {
            println!("\nFollow-up alerts (oldest first)");
            for alert in &alerts {
                println!(
                    "- {} [{}] quiet for {} days",
                    alert.referral.id.0, alert.referral.status, alert.days_since_update
                );
            }
        }
        Err(err) => println!("\nFollow-up alerts unavailable: {}", err),
    }

    let events = notifier.events();
    if events.is_empty() {
        println!("\nPartner notifications: none dispatched");
    } else {
        println!("\nPartner notifications");
        for event in events {
            println!("- template={} -> {}", event.template, event.referral_id.0);
        }
    }

    Ok(())
}

// Stands in for a marketplace checkout export when no --leads-csv is given.
// The last row references an offer outside the seeded catalog and is
// reported as rejected.
const SAMPLE_EXPORT: &str = "\
Offer ID,Partner ID,Buyer Company,Buyer Contact,Success Fee Percent,Expected Value
offer-crm,partner-nimbus,Padaria Estrela,ana@estrela.example,10,40000
offer-fiscal,partner-acme,Oficina Vulcano,bruno@vulcano.example,12,
offer-ghost,partner-acme,Mercearia Lua,carla@lua.example,15,25000
";

fn demo_referral(
    offer: &str,
    partner: &str,
    company: &str,
    success_fee_percent: u8,
    expected_value: Option<u64>,
) -> NewReferral {
    NewReferral {
        offer_id: OfferId(offer.to_string()),
        partner_id: PartnerId(partner.to_string()),
        buyer: Buyer {
            company: company.to_string(),
            contact: format!("contact@{}.example", company.to_lowercase().replace(' ', "-")),
        },
        origin: ReferralOrigin::Marketplace,
        success_fee_percent,
        expected_value,
    }
}

fn create_or_report(
    service: &Arc<AppReferralService>,
    request: NewReferral,
    now: chrono::DateTime<Utc>,
) -> Option<Referral> {
    match service.create_referral(request, now) {
        Ok(referral) => {
            println!(
                "- {} -> {} ({}%, expected {:?})",
                referral.id.0,
                referral.buyer.company,
                referral.success_fee_percent,
                referral.expected_value
            );
            Some(referral)
        }
        Err(err) => {
            println!("- Referral rejected: {}", err);
            None
        }
    }
}

fn walk_to_settlement(
    service: &Arc<AppReferralService>,
    referral: &Referral,
    routed_at: chrono::DateTime<Utc>,
) {
    let steps = [
        (ReferralStatus::Acked, None, Duration::hours(2)),
        (ReferralStatus::InNegotiation, None, Duration::days(1)),
        (ReferralStatus::Won, Some(120_000), Duration::days(2)),
    ];

    for (target, won_value, offset) in steps {
        match service.update_status(
            &referral.id,
            target,
            won_value,
            "demo-manager",
            routed_at + offset,
        ) {
            Ok(updated) => {
                if let Some(fee) = updated.success_fee_realized {
                    println!(
                        "  {} settled: won value {:?}, realized fee {}",
                        updated.id.0, updated.won_value, fee
                    );
                }
            }
            Err(err) => {
                println!("  Transition to {:?} rejected: {}", target, err);
                return;
            }
        }
    }
}
