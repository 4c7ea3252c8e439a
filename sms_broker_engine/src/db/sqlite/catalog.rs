//! Reads for the configured vendor slots, purchasable services, discount layers and abuse-rule overrides. The
//! broker only consumes these tables; they are written by the admin tooling.
use log::warn;
use provider_tools::{ProviderCode, ProviderProfile};
use smb_common::{Money, Secret, ServerId, UserId};
use sqlx::{Row, SqliteConnection};

use crate::{
    db_types::{ServerEntry, ServiceEntry},
    traits::DiscountSet,
};

pub async fn site_maintenance(conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT maintenance FROM servers WHERE server = 0").fetch_optional(conn).await?;
    Ok(row.map(|(m,)| m).unwrap_or(false))
}

pub async fn fetch_server(server: ServerId, conn: &mut SqliteConnection) -> Result<Option<ServerEntry>, sqlx::Error> {
    let row = sqlx::query("SELECT server, provider, api_key, maintenance FROM servers WHERE server = $1")
        .bind(server)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|row| entry_from_row(&row)).transpose()?)
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ServerEntry, sqlx::Error> {
    let server: ServerId = row.try_get("server")?;
    let provider: String = row.try_get("provider")?;
    let api_key: String = row.try_get("api_key")?;
    let maintenance: bool = row.try_get("maintenance")?;
    let provider = match provider.parse::<ProviderCode>() {
        Ok(code) => Some(code),
        Err(_) if server == ServerId::SITE => None,
        Err(e) => {
            warn!("🗃️ Server {server} has an unrecognised provider configured: {e}");
            None
        },
    };
    Ok(ServerEntry { server, provider, api_key: Secret::new(api_key), maintenance })
}

pub async fn fetch_service(
    service: &str,
    server: ServerId,
    conn: &mut SqliteConnection,
) -> Result<Option<ServiceEntry>, sqlx::Error> {
    let entry = sqlx::query_as("SELECT * FROM services WHERE service = $1 AND server = $2")
        .bind(service)
        .bind(server)
        .fetch_optional(conn)
        .await?;
    Ok(entry)
}

pub async fn fetch_discounts(
    user_id: &UserId,
    service: &str,
    server: ServerId,
    conn: &mut SqliteConnection,
) -> Result<DiscountSet, sqlx::Error> {
    let server_discount: Option<(Money,)> =
        sqlx::query_as("SELECT amount FROM server_discounts WHERE server = $1")
            .bind(server)
            .fetch_optional(&mut *conn)
            .await?;
    let service_discount: Option<(Money,)> =
        sqlx::query_as("SELECT amount FROM service_discounts WHERE service = $1 AND server = $2")
            .bind(service)
            .bind(server)
            .fetch_optional(&mut *conn)
            .await?;
    let user_discount: Option<(Money,)> =
        sqlx::query_as("SELECT amount FROM user_discounts WHERE user_id = $1 AND service = $2 AND server = $3")
            .bind(user_id.as_str())
            .bind(service)
            .bind(server)
            .fetch_optional(conn)
            .await?;
    Ok(DiscountSet {
        server_discount: server_discount.map(|(m,)| m),
        service_discount: service_discount.map(|(m,)| m),
        user_discount: user_discount.map(|(m,)| m),
    })
}

/// The configured vendor slots for building the provider registry. Server 0 (the site flag) is excluded, as is
/// any slot whose provider code does not parse.
pub async fn provider_profiles(conn: &mut SqliteConnection) -> Result<Vec<ProviderProfile>, sqlx::Error> {
    let rows = sqlx::query("SELECT server, provider, api_key, maintenance FROM servers WHERE server > 0")
        .fetch_all(conn)
        .await?;
    let mut profiles = Vec::with_capacity(rows.len());
    for row in &rows {
        let entry = entry_from_row(row)?;
        match entry.provider {
            Some(code) => profiles.push(ProviderProfile::new(entry.server, code, entry.api_key)),
            None => warn!("🗃️ Server {} is not wired to any provider and will be skipped", entry.server),
        }
    }
    Ok(profiles)
}

pub async fn abuse_rule_disarmed(rule: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT disarmed FROM abuse_rules WHERE rule = $1").bind(rule).fetch_optional(conn).await?;
    Ok(row.map(|(d,)| d).unwrap_or(false))
}
