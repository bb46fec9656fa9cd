//! Basic usage example.
//!
//! Run with:
//! ```sh
//! ATOMX_EMAIL=you@example.com ATOMX_PASSWORD=secret cargo run --example basic
//! ```

use std::time::Duration as StdDuration;

use atomx::{Field, PrettyPrint, ReportRequest, Session};
use chrono::{Duration, Utc};

#[tokio::main]
async fn main() -> atomx::Result<()> {
    tracing_subscriber::fmt::init();

    let session = Session::from_env()?;
    session.login(None, None).await?;
    println!("Logged in to {}", session.endpoint());

    // List a few creatives
    let creatives = session
        .get_with_query("creatives", &[("limit", "5")])
        .await?
        .into_records()
        .unwrap_or_default();

    println!("Found {} creatives", creatives.len());
    for creative in &creatives {
        println!("{}\n", creative.pretty_print());
    }

    // Follow a relation of the first creative
    if let Some(mut creative) = creatives.into_iter().next() {
        if let Some(advertiser) = creative.get_field("advertiser").await?.and_then(Field::as_record) {
            println!("Owned by:\n{}\n", advertiser.pretty_print());
        }
    }

    // Impressions per hour over the last day
    let mut report = session
        .report(
            ReportRequest::new("advertiser", Utc::now() - Duration::days(1))
                .groups(["hour"])
                .sums(["impressions", "clicks"]),
        )
        .await?;

    while !report.is_ready().await? {
        tokio::time::sleep(StdDuration::from_secs(1)).await;
    }
    println!("{}\n", report.pretty_print());

    match report.table().await?.render() {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{}", report.content().await?),
    }

    session.logout().await;
    Ok(())
}
