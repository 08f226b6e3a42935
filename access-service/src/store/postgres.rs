//! PostgreSQL store.
//!
//! Rows are read into private `FromRow` structs and converted to the domain
//! models so that unknown status codes surface as backend errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{ActivityLogStore, GroupStore, OtpStore, StoreError, UserStore};
use crate::models::{
    ActivityLog, Group, Identifier, OtpCode, Permission, Role, User, VendorStatus,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "user_id, email, phone, password_hash, first_name, last_name, \
     role_code, vendor_status_code, is_active, is_admin, is_superuser, is_deleted, \
     module_access, last_login_utc, created_utc";

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
    first_name: String,
    last_name: String,
    role_code: String,
    vendor_status_code: Option<String>,
    is_active: bool,
    is_admin: bool,
    is_superuser: bool,
    is_deleted: bool,
    module_access: Vec<String>,
    last_login_utc: Option<DateTime<Utc>>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_code(&row.role_code).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("unknown role code '{}'", row.role_code))
        })?;
        let vendor_status = row
            .vendor_status_code
            .as_deref()
            .map(|code| {
                VendorStatus::from_code(code).ok_or_else(|| {
                    StoreError::Backend(anyhow::anyhow!("unknown vendor status '{}'", code))
                })
            })
            .transpose()?;

        Ok(User {
            user_id: row.user_id,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            vendor_status,
            is_active: row.is_active,
            is_admin: row.is_admin,
            is_superuser: row.is_superuser,
            is_deleted: row.is_deleted,
            module_access: row.module_access,
            last_login_utc: row.last_login_utc,
            created_utc: row.created_utc,
        })
    }
}

#[derive(FromRow)]
struct OtpRow {
    otp_id: Uuid,
    identifier: String,
    code_hash: String,
    issued_utc: DateTime<Utc>,
    expiry_utc: DateTime<Utc>,
    consumed_utc: Option<DateTime<Utc>>,
    attempt_count: i32,
}

impl From<OtpRow> for OtpCode {
    fn from(row: OtpRow) -> Self {
        OtpCode {
            otp_id: row.otp_id,
            identifier: row.identifier,
            code_hash: row.code_hash,
            issued_utc: row.issued_utc,
            expiry_utc: row.expiry_utc,
            consumed_utc: row.consumed_utc,
            attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
        }
    }
}

#[derive(FromRow)]
struct ActivityRow {
    log_id: Uuid,
    user_id: Uuid,
    action: String,
    date_created: DateTime<Utc>,
    is_deleted: bool,
}

impl From<ActivityRow> for ActivityLog {
    fn from(row: ActivityRow) -> Self {
        ActivityLog {
            log_id: row.log_id,
            user_id: row.user_id,
            action: row.action,
            date_created: row.date_created,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(FromRow)]
struct PermissionRow {
    permission_id: Uuid,
    codename: String,
    name: String,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            permission_id: row.permission_id,
            codename: row.codename,
            name: row.name,
        }
    }
}

#[async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, phone, password_hash, first_name, last_name,
                               role_code, vendor_status_code, is_active, is_admin, is_superuser,
                               is_deleted, module_access, last_login_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.vendor_status.map(|s| s.as_str()))
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.is_superuser)
        .bind(user.is_deleted)
        .bind(&user.module_access)
        .bind(user.last_login_utc)
        .bind(user.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE user_id = $1 AND NOT is_deleted",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_admins(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users \
             WHERE role_code = $1 AND is_active AND NOT is_deleted \
             ORDER BY created_utc DESC",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(Role::Admin.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn find_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StoreError> {
        let column = match identifier {
            Identifier::Email(_) => "email",
            Identifier::Phone(_) => "phone",
        };
        let sql = format!(
            "SELECT {} FROM users WHERE {} = $1 AND NOT is_deleted",
            USER_COLUMNS, column
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(identifier.value())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE users SET is_active = $2 WHERE user_id = $1 AND NOT is_deleted")
                .bind(user_id)
                .bind(active)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE users SET is_deleted = TRUE WHERE user_id = $1 AND NOT is_deleted")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_utc = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OtpStore for Database {
    async fn replace_otp(&self, otp: &OtpCode) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (identifier, otp_id, code_hash, issued_utc, expiry_utc, consumed_utc)
            VALUES ($1, $2, $3, $4, $5, NULL)
            ON CONFLICT (identifier) DO UPDATE
               SET otp_id = EXCLUDED.otp_id,
                   code_hash = EXCLUDED.code_hash,
                   issued_utc = EXCLUDED.issued_utc,
                   expiry_utc = EXCLUDED.expiry_utc,
                   consumed_utc = NULL,
                   attempt_count = 0
            "#,
        )
        .bind(&otp.identifier)
        .bind(otp.otp_id)
        .bind(&otp.code_hash)
        .bind(otp.issued_utc)
        .bind(otp.expiry_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_otp(&self, identifier: &str) -> Result<Option<OtpCode>, StoreError> {
        let row = sqlx::query_as::<_, OtpRow>(
            "SELECT otp_id, identifier, code_hash, issued_utc, expiry_utc, consumed_utc, \
             attempt_count FROM otp_codes WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OtpCode::from))
    }

    async fn consume_otp(
        &self,
        identifier: &str,
        otp_id: Uuid,
        max_attempts: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE otp_codes SET consumed_utc = $3 \
             WHERE identifier = $1 AND otp_id = $2 AND consumed_utc IS NULL \
               AND attempt_count < $4",
        )
        .bind(identifier)
        .bind(otp_id)
        .bind(at)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_miss(&self, identifier: &str, otp_id: Uuid) -> Result<Option<u32>, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE otp_codes SET attempt_count = attempt_count + 1 \
             WHERE identifier = $1 AND otp_id = $2 AND consumed_utc IS NULL \
             RETURNING attempt_count",
        )
        .bind(identifier)
        .bind(otp_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count.map(|c| u32::try_from(c).unwrap_or(0)))
    }
}

#[async_trait]
impl GroupStore for Database {
    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO permissions (permission_id, codename, name) VALUES ($1, $2, $3)")
            .bind(permission.permission_id)
            .bind(&permission.codename)
            .bind(&permission.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO groups (group_id, name) VALUES ($1, $2)")
            .bind(group.group_id)
            .bind(&group.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO group_permissions (group_id, permission_id) \
             SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(group.group_id)
        .bind(&group.permission_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_groups(&self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError> {
        let groups: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT group_id, name FROM groups WHERE group_id = ANY($1)")
                .bind(group_ids)
                .fetch_all(&self.pool)
                .await?;
        let links: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT group_id, permission_id FROM group_permissions WHERE group_id = ANY($1)",
        )
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups
            .into_iter()
            .map(|(group_id, name)| Group {
                group_id,
                name,
                permission_ids: links
                    .iter()
                    .filter(|(g, _)| *g == group_id)
                    .map(|(_, p)| *p)
                    .collect(),
            })
            .collect())
    }

    async fn add_user_groups(&self, user_id: Uuid, group_ids: &[Uuid]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_groups (user_id, group_id) \
             SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(group_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_group_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT group_id FROM user_groups WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT DISTINCT p.permission_id, p.codename, p.name
            FROM user_groups ug
            JOIN group_permissions gp ON gp.group_id = ug.group_id
            JOIN permissions p ON p.permission_id = gp.permission_id
            WHERE ug.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }
}

#[async_trait]
impl ActivityLogStore for Database {
    async fn append_activity(&self, entry: &ActivityLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activity_logs (log_id, user_id, action, date_created, is_deleted) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.log_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(entry.date_created)
        .bind(entry.is_deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_activity(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT log_id, user_id, action, date_created, is_deleted
            FROM activity_logs
            WHERE user_id = $1 AND NOT is_deleted
            ORDER BY date_created DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    async fn connect() -> Database {
        let url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/access_test".to_string());
        let pool = PgPool::connect(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Database::new(pool)
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn user_round_trip_hides_deleted_rows() {
        let db = connect().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = User::new(NewUser {
            email: Some(email.clone()),
            phone: None,
            password_hash: "hash".to_string(),
            first_name: "Pg".to_string(),
            last_name: "User".to_string(),
            role: Role::Vendor,
        });
        db.insert_user(&user).await.unwrap();

        let found = db.find_user_by_id(user.user_id).await.unwrap().unwrap();
        assert_eq!(found.vendor_status, Some(VendorStatus::Pending));

        assert!(db.soft_delete_user(user.user_id).await.unwrap());
        let ident = Identifier::email(&email).unwrap();
        assert!(db.find_user_by_identifier(&ident).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn duplicate_email_is_classified() {
        let db = connect().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let make = || {
            User::new(NewUser {
                email: Some(email.clone()),
                phone: None,
                password_hash: "hash".to_string(),
                first_name: "Pg".to_string(),
                last_name: "User".to_string(),
                role: Role::User,
            })
        };
        db.insert_user(&make()).await.unwrap();
        assert!(matches!(
            db.insert_user(&make()).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn otp_upsert_supersedes_previous_code() {
        let db = connect().await;
        let identifier = format!("{}@example.com", Uuid::new_v4());
        let now = Utc::now();
        let first = OtpCode::new(identifier.clone(), "h1".to_string(), now, now);
        let second = OtpCode::new(identifier.clone(), "h2".to_string(), now, now);
        db.replace_otp(&first).await.unwrap();
        db.replace_otp(&second).await.unwrap();

        assert!(!db.consume_otp(&identifier, first.otp_id, 5, now).await.unwrap());
        assert!(db.consume_otp(&identifier, second.otp_id, 5, now).await.unwrap());
        assert!(!db.consume_otp(&identifier, second.otp_id, 5, now).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn otp_misses_are_counted_and_reset_on_reissue() {
        let db = connect().await;
        let identifier = format!("{}@example.com", Uuid::new_v4());
        let now = Utc::now();
        let first = OtpCode::new(identifier.clone(), "h1".to_string(), now, now);
        db.replace_otp(&first).await.unwrap();

        assert_eq!(db.record_miss(&identifier, first.otp_id).await.unwrap(), Some(1));
        assert_eq!(db.record_miss(&identifier, first.otp_id).await.unwrap(), Some(2));
        assert!(!db.consume_otp(&identifier, first.otp_id, 2, now).await.unwrap());

        let second = OtpCode::new(identifier.clone(), "h2".to_string(), now, now);
        db.replace_otp(&second).await.unwrap();
        let stored = db.find_otp(&identifier).await.unwrap().unwrap();
        assert_eq!(stored.attempt_count, 0);
        assert!(db.consume_otp(&identifier, second.otp_id, 2, now).await.unwrap());
    }
}
