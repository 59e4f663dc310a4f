use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{Ban, BanRepository, DomainError, IdentityHash, Result};
use sqlx::Row;
use tracing::debug;

use super::{storage, SqliteStore};

#[async_trait]
impl BanRepository for SqliteStore {
    async fn upsert_ban(&self, ban: Ban) -> Result<()> {
        // an existing ban is only ever extended
        sqlx::query(
            r#"
            INSERT INTO bans (ip_hash, reason, expiration) VALUES (?, ?, ?)
            ON CONFLICT(ip_hash) DO UPDATE SET
                reason = excluded.reason,
                expiration = excluded.expiration
            WHERE excluded.expiration > bans.expiration
            "#,
        )
        .bind(ban.ip_hash.as_str())
        .bind(&ban.reason)
        .bind(ban.expiration)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_ban(&self, ip_hash: &IdentityHash) -> Result<Ban> {
        loop {
            let row = sqlx::query("SELECT reason, expiration FROM bans WHERE ip_hash = ?")
                .bind(ip_hash.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?
                .ok_or_else(|| DomainError::not_found("ban", ip_hash))?;

            let reason: String = row.try_get("reason").map_err(storage)?;
            let expiration: DateTime<Utc> = row.try_get("expiration").map_err(storage)?;

            if self.clock.now() <= expiration {
                return Ok(Ban { ip_hash: ip_hash.clone(), reason, expiration });
            }

            // only the row that was read; an upsert in between extended it
            let removed = sqlx::query("DELETE FROM bans WHERE ip_hash = ? AND expiration = ?")
                .bind(ip_hash.as_str())
                .bind(expiration)
                .execute(&self.pool)
                .await
                .map_err(storage)?
                .rows_affected();
            if removed > 0 {
                debug!(identity = ip_hash.short(), "expired ban removed");
                return Err(DomainError::not_found("ban", ip_hash));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use domains::Clock;

    use super::super::testing::store;
    use super::*;

    fn h1() -> IdentityHash {
        IdentityHash::new("h1")
    }

    #[tokio::test]
    async fn later_ban_extends_earlier_never_shortens() {
        let (store, clock) = store(50).await;
        let now = clock.now();

        store
            .upsert_ban(Ban { ip_hash: h1(), reason: "spam".into(), expiration: now + TimeDelta::days(7) })
            .await
            .unwrap();
        store
            .upsert_ban(Ban { ip_hash: h1(), reason: "again".into(), expiration: now + TimeDelta::days(1) })
            .await
            .unwrap();

        let ban = store.get_ban(&h1()).await.unwrap();
        assert_eq!(ban.expiration, now + TimeDelta::days(7));
        assert_eq!(ban.reason, "spam");

        store
            .upsert_ban(Ban { ip_hash: h1(), reason: "worse".into(), expiration: now + TimeDelta::days(30) })
            .await
            .unwrap();
        let ban = store.get_ban(&h1()).await.unwrap();
        assert_eq!(ban.expiration, now + TimeDelta::days(30));
        assert_eq!(ban.reason, "worse");
    }

    #[tokio::test]
    async fn expired_ban_is_deleted_on_read() {
        let (store, clock) = store(50).await;
        let expiration = clock.now() + TimeDelta::hours(1);
        store.upsert_ban(Ban { ip_hash: h1(), reason: "spam".into(), expiration }).await.unwrap();

        clock.set(expiration);
        assert!(store.get_ban(&h1()).await.is_ok());

        clock.advance(TimeDelta::seconds(1));
        assert!(store.get_ban(&h1()).await.unwrap_err().is_not_found());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bans")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn expired_ban_cleanup_keeps_a_ban_extended_meanwhile() {
        let (store, clock) = store(50).await;
        let now = clock.now();
        store
            .upsert_ban(Ban { ip_hash: h1(), reason: "old".into(), expiration: now - TimeDelta::hours(1) })
            .await
            .unwrap();
        // the ban an expired read observed is no longer the stored one
        let stale = now - TimeDelta::hours(1);
        store
            .upsert_ban(Ban { ip_hash: h1(), reason: "fresh".into(), expiration: now + TimeDelta::days(7) })
            .await
            .unwrap();

        let removed = sqlx::query("DELETE FROM bans WHERE ip_hash = ? AND expiration = ?")
            .bind(h1().as_str())
            .bind(stale)
            .execute(store.pool())
            .await
            .unwrap()
            .rows_affected();
        assert_eq!(removed, 0);
        assert_eq!(store.get_ban(&h1()).await.unwrap().reason, "fresh");
    }

    #[tokio::test]
    async fn unknown_identity_has_no_ban() {
        let (store, _) = store(50).await;
        assert!(store.get_ban(&IdentityHash::new("nobody")).await.unwrap_err().is_not_found());
    }
}
