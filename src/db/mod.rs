//! Database Module
//!
//! SQLite 사용자 레코드 관리. 암호화된 시크릿은 불투명한 TEXT 컬럼으로만 다룹니다.

mod schema;

use std::path::Path;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension};

use crate::error::AppError;
use crate::models::{SecretKind, UserAccount};
use crate::secrets::EncryptedSecret;

impl ToSql for EncryptedSecret {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.as_str().to_sql()
    }
}

impl FromSql for EncryptedSecret {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(EncryptedSecret::from_stored)
    }
}

/// 데이터베이스 래퍼
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 새 데이터베이스 연결 생성
    pub fn new(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// 메모리 DB (테스트/일회성 실행용)
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// 데이터베이스 스키마 초기화
    pub fn initialize(&self) -> Result<(), AppError> {
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        Ok(())
    }

    /// 사용자 생성 (이메일 중복 시 AccountExists)
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<UserAccount, AppError> {
        if self.find_user_by_email(email)?.is_some() {
            return Err(AppError::AccountExists(email.to_string()));
        }

        let account = UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            (&account.id, &account.email, password_hash, account.created_at),
        )?;

        Ok(account)
    }

    /// ID로 사용자 조회
    pub fn get_user(&self, user_id: &str) -> Result<UserAccount, AppError> {
        self.conn
            .query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok(UserAccount {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))
    }

    /// 이메일로 사용자 조회
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, AppError> {
        Ok(self.find_login(email)?.map(|(account, _)| account))
    }

    /// 로그인 검증용: 계정 + 비밀번호 해시
    pub fn find_login(&self, email: &str) -> Result<Option<(UserAccount, String)>, AppError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, created_at, password_hash FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok((
                        UserAccount {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            created_at: row.get(2)?,
                        },
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    /// `f` 안의 모든 쓰기를 하나의 트랜잭션으로 실행
    ///
    /// `f`가 에러를 반환하면 커밋하지 않고 전부 롤백됩니다.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> Result<T, AppError>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// 사용자 ID 목록 (생성 순)
    pub fn list_user_ids(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users ORDER BY created_at, rowid")?;
        let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for id in iter {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// 사용자 삭제 (저장된 시크릿 blob도 함께 삭제됨)
    pub fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        let deleted = self.conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
        if deleted == 0 {
            return Err(AppError::AccountNotFound(user_id.to_string()));
        }
        Ok(())
    }

    /// 시크릿 blob 저장 (`None`이면 제거)
    pub fn set_secret_blob(
        &self,
        user_id: &str,
        kind: SecretKind,
        blob: Option<&EncryptedSecret>,
    ) -> Result<(), AppError> {
        let sql = format!("UPDATE users SET {} = ?1 WHERE id = ?2", kind.column());
        let updated = self.conn.execute(&sql, (blob, user_id))?;
        if updated == 0 {
            return Err(AppError::AccountNotFound(user_id.to_string()));
        }
        Ok(())
    }

    /// 시크릿 blob 조회
    pub fn get_secret_blob(
        &self,
        user_id: &str,
        kind: SecretKind,
    ) -> Result<Option<EncryptedSecret>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", kind.column());
        self.conn
            .query_row(&sql, [user_id], |row| row.get::<_, Option<EncryptedSecret>>(0))
            .optional()?
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_create_and_lookup_user() {
        let db = test_db();
        let account = db.create_user("ana@example.com", "hash").unwrap();

        assert_eq!(db.get_user(&account.id).unwrap(), account);
        assert_eq!(
            db.find_user_by_email("ana@example.com").unwrap(),
            Some(account.clone())
        );
        assert!(db.find_user_by_email("nobody@example.com").unwrap().is_none());

        let (login, hash) = db.find_login("ana@example.com").unwrap().unwrap();
        assert_eq!(login.id, account.id);
        assert_eq!(hash, "hash");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = test_db();
        db.create_user("ana@example.com", "hash").unwrap();
        let err = db.create_user("ana@example.com", "other").unwrap_err();
        assert!(matches!(err, AppError::AccountExists(_)));
    }

    #[test]
    fn test_secret_blob_lifecycle() {
        let db = test_db();
        let account = db.create_user("ana@example.com", "hash").unwrap();

        assert_eq!(db.get_secret_blob(&account.id, SecretKind::AiProviderKey).unwrap(), None);

        let blob = EncryptedSecret::from_stored("opaque-blob");
        db.set_secret_blob(&account.id, SecretKind::AiProviderKey, Some(&blob))
            .unwrap();
        assert_eq!(
            db.get_secret_blob(&account.id, SecretKind::AiProviderKey).unwrap(),
            Some(blob)
        );
        assert_eq!(db.get_secret_blob(&account.id, SecretKind::EmailPassword).unwrap(), None);

        db.set_secret_blob(&account.id, SecretKind::AiProviderKey, None)
            .unwrap();
        assert_eq!(db.get_secret_blob(&account.id, SecretKind::AiProviderKey).unwrap(), None);
    }

    #[test]
    fn test_unknown_user_errors() {
        let db = test_db();
        let blob = EncryptedSecret::from_stored("opaque-blob");

        assert!(matches!(
            db.set_secret_blob("missing", SecretKind::EmailPassword, Some(&blob)),
            Err(AppError::AccountNotFound(_))
        ));
        assert!(matches!(
            db.get_secret_blob("missing", SecretKind::EmailPassword),
            Err(AppError::AccountNotFound(_))
        ));
        assert!(matches!(db.get_user("missing"), Err(AppError::AccountNotFound(_))));
        assert!(matches!(db.delete_user("missing"), Err(AppError::AccountNotFound(_))));
    }

    #[test]
    fn test_delete_user_removes_blobs() {
        let db = test_db();
        let account = db.create_user("ana@example.com", "hash").unwrap();
        let blob = EncryptedSecret::from_stored("opaque-blob");
        db.set_secret_blob(&account.id, SecretKind::EmailPassword, Some(&blob))
            .unwrap();

        db.delete_user(&account.id).unwrap();
        assert!(db.list_user_ids().unwrap().is_empty());
        assert!(matches!(
            db.get_secret_blob(&account.id, SecretKind::EmailPassword),
            Err(AppError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let account = db.create_user("ana@example.com", "hash").unwrap();
        let blob = EncryptedSecret::from_stored("opaque-blob");

        let result: Result<(), AppError> = db.with_transaction(|db| {
            db.set_secret_blob(&account.id, SecretKind::AiProviderKey, Some(&blob))?;
            Err(AppError::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(db.get_secret_blob(&account.id, SecretKind::AiProviderKey).unwrap(), None);

        db.with_transaction(|db| db.set_secret_blob(&account.id, SecretKind::AiProviderKey, Some(&blob)))
            .unwrap();
        assert_eq!(
            db.get_secret_blob(&account.id, SecretKind::AiProviderKey).unwrap(),
            Some(blob)
        );
    }

    #[test]
    fn test_failed_rotation_leaves_every_blob_on_old_key() {
        use crate::secrets::{rotate_vault_key, SecretVault, VaultKey};

        let db = test_db();
        let ana = db.create_user("ana@example.com", "hash").unwrap();
        let bo = db.create_user("bo@example.com", "hash").unwrap();
        let old_vault = SecretVault::new(VaultKey::generate());
        let new_vault = SecretVault::new(VaultKey::generate());

        for (account, secret) in [(&ana, "sk-ana"), (&bo, "sk-bo")] {
            let blob = old_vault.encrypt(secret).unwrap();
            db.set_secret_blob(&account.id, SecretKind::AiProviderKey, Some(&blob))
                .unwrap();
        }

        // 두 번째 계정의 쓰기만 실패시킴
        db.conn
            .execute_batch(
                "CREATE TRIGGER block_bo_update BEFORE UPDATE OF openai_enc_key ON users
                 WHEN OLD.email = 'bo@example.com'
                 BEGIN SELECT RAISE(ABORT, 'write blocked'); END;",
            )
            .unwrap();

        let result = rotate_vault_key(&db, &old_vault, &new_vault);
        assert!(matches!(result, Err(AppError::Database(_))));

        for (account, secret) in [(&ana, "sk-ana"), (&bo, "sk-bo")] {
            let blob = db
                .get_secret_blob(&account.id, SecretKind::AiProviderKey)
                .unwrap()
                .unwrap();
            assert_eq!(old_vault.decrypt(&blob).unwrap().as_str(), secret);
            assert!(new_vault.decrypt(&blob).is_err());
        }
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("instance").join("app.db");

        let id = {
            let db = Database::new(&path).unwrap();
            db.initialize().unwrap();
            db.create_user("ana@example.com", "hash").unwrap().id
        };

        let db = Database::new(&path).unwrap();
        db.initialize().unwrap();
        assert_eq!(db.list_user_ids().unwrap(), vec![id]);
    }
}
