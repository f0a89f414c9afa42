use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const SPACE_COLUMNS: &str = "id, parent_id, path_name, path, name, description, is_public, created_by, created_at, updated_at";
const REPO_COLUMNS: &str = "id, space_id, path_name, path, description, is_public, default_branch, created_by, created_at, updated_at, last_push_at";
const TOKEN_COLUMNS: &str = "id, token_hash, token_lookup, is_admin, principal_id, created_at, expires_at, last_used_at";
const GRANT_COLUMNS: &str = "principal_id, space_id, allow_bits, deny_bits, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Maps constraint violations on insert: duplicate paths become conflicts,
/// dangling references mean the referenced entity vanished.
fn map_insert_error(e: rusqlite::Error, duplicate: &str, missing: &'static str) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::Conflict(duplicate.to_string())
        }
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Error::NotFound(missing)
        }
        other => Error::from(other),
    }
}

fn principal_from_row(row: &Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get(0)?,
        uid: row.get(1)?,
        display_name: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        principal_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: parse_optional_datetime(row.get(6)?),
        last_used_at: parse_optional_datetime(row.get(7)?),
    })
}

fn space_from_row(row: &Row<'_>) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        path_name: row.get(2)?,
        path: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        is_public: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<Repo> {
    Ok(Repo {
        id: row.get(0)?,
        space_id: row.get(1)?,
        path_name: row.get(2)?,
        path: row.get(3)?,
        description: row.get(4)?,
        is_public: row.get(5)?,
        default_branch: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
        last_push_at: parse_optional_datetime(row.get(10)?),
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<SpaceGrant> {
    Ok(SpaceGrant {
        principal_id: row.get(0)?,
        space_id: row.get(1)?,
        allow_bits: Permission::from(row.get::<_, i64>(2)?),
        deny_bits: Permission::from(row.get::<_, i64>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Principal operations

    fn create_principal(&self, principal: &Principal) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO principals (id, uid, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    principal.id,
                    principal.uid,
                    principal.display_name,
                    format_datetime(&principal.created_at),
                    format_datetime(&principal.updated_at),
                ],
            )
            .map_err(|e| map_insert_error(e, "Principal already exists", "principal"))?;
        Ok(())
    }

    fn get_principal(&self, id: &str) -> Result<Option<Principal>> {
        self.conn()
            .query_row(
                "SELECT id, uid, display_name, created_at, updated_at FROM principals WHERE id = ?1",
                params![id],
                principal_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_principal_by_uid(&self, uid: &str) -> Result<Option<Principal>> {
        self.conn()
            .query_row(
                "SELECT id, uid, display_name, created_at, updated_at FROM principals WHERE uid = ?1",
                params![uid],
                principal_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_principals(&self, cursor: &str, limit: i32) -> Result<Vec<Principal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, uid, display_name, created_at, updated_at
             FROM principals WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![cursor, limit], principal_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, principal_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.principal_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(map_insert_error(e, "Token already exists", "principal")),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Space operations

    fn create_space(&self, space: &mut Space) -> Result<()> {
        let conn = self.conn();
        let duplicate = format!("A space or repository with path '{}' already exists", space.path);

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM repos WHERE path = ?1)",
            params![space.path],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::Conflict(duplicate));
        }

        conn.execute(
            "INSERT INTO spaces (parent_id, path_name, path, name, description, is_public, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                space.parent_id,
                space.path_name,
                space.path,
                space.name,
                space.description,
                space.is_public,
                space.created_by,
                format_datetime(&space.created_at),
                format_datetime(&space.updated_at),
            ],
        )
        .map_err(|e| map_insert_error(e, &duplicate, "parent space"))?;

        space.id = conn.last_insert_rowid();
        Ok(())
    }

    fn get_space(&self, id: i64) -> Result<Option<Space>> {
        self.conn()
            .query_row(
                &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = ?1"),
                params![id],
                space_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_space_by_path(&self, path: &str) -> Result<Option<Space>> {
        self.conn()
            .query_row(
                &format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE path = ?1"),
                params![path.to_lowercase()],
                space_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    // Repo operations

    fn create_repo(&self, repo: &mut Repo) -> Result<()> {
        let conn = self.conn();

        // Spaces and repos share one namespace of paths.
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM spaces WHERE path = ?1)",
            params![repo.path],
            |row| row.get(0),
        )?;
        let duplicate = format!("A space or repository with path '{}' already exists", repo.path);
        if taken {
            return Err(Error::Conflict(duplicate));
        }

        conn.execute(
            "INSERT INTO repos (space_id, path_name, path, description, is_public, default_branch, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                repo.space_id,
                repo.path_name,
                repo.path,
                repo.description,
                repo.is_public,
                repo.default_branch,
                repo.created_by,
                format_datetime(&repo.created_at),
                format_datetime(&repo.updated_at),
            ],
        )
        .map_err(|e| map_insert_error(e, &duplicate, "space"))?;

        repo.id = conn.last_insert_rowid();
        Ok(())
    }

    fn get_repo(&self, id: i64) -> Result<Option<Repo>> {
        self.conn()
            .query_row(
                &format!("SELECT {REPO_COLUMNS} FROM repos WHERE id = ?1"),
                params![id],
                repo_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_repo_by_path(&self, path: &str) -> Result<Option<Repo>> {
        self.conn()
            .query_row(
                &format!("SELECT {REPO_COLUMNS} FROM repos WHERE path = ?1"),
                params![path.to_lowercase()],
                repo_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_repo_last_push(&self, id: i64) -> Result<()> {
        let now = format_datetime(&Utc::now());
        let rows = self.conn().execute(
            "UPDATE repos SET last_push_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound("repository"));
        }
        Ok(())
    }

    // Space grant operations

    fn upsert_space_grant(&self, grant: &SpaceGrant) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO space_grants (principal_id, space_id, allow_bits, deny_bits, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(principal_id, space_id) DO UPDATE SET
                    allow_bits = excluded.allow_bits,
                    deny_bits = excluded.deny_bits,
                    updated_at = excluded.updated_at",
                params![
                    grant.principal_id,
                    grant.space_id,
                    i64::from(grant.allow_bits),
                    i64::from(grant.deny_bits),
                    format_datetime(&grant.created_at),
                    format_datetime(&grant.updated_at),
                ],
            )
            .map_err(|e| map_insert_error(e, "Grant already exists", "principal or space"))?;
        Ok(())
    }

    fn get_space_grant(&self, principal_id: &str, space_id: i64) -> Result<Option<SpaceGrant>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GRANT_COLUMNS} FROM space_grants WHERE principal_id = ?1 AND space_id = ?2"
                ),
                params![principal_id, space_id],
                grant_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_principal_space_grants(&self, principal_id: &str) -> Result<Vec<SpaceGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GRANT_COLUMNS} FROM space_grants WHERE principal_id = ?1 ORDER BY space_id"
        ))?;

        let rows = stmt.query_map(params![principal_id], grant_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_space_grant(&self, principal_id: &str, space_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM space_grants WHERE principal_id = ?1 AND space_id = ?2",
            params![principal_id, space_id],
        )?;
        Ok(rows > 0)
    }

    fn has_admin_token(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use tempfile::TempDir;

    pub(crate) fn test_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    pub(crate) fn principal(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            uid: id.to_string(),
            display_name: id.to_uppercase(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn space(parent: Option<&Space>, path_name: &str, owner: &str) -> Space {
        let parent_path = parent.map(|p| p.path.as_str()).unwrap_or("");
        Space {
            id: 0,
            parent_id: parent.map(|p| p.id),
            path_name: path_name.to_string(),
            path: crate::paths::concatenate(parent_path, path_name),
            name: path_name.to_string(),
            description: None,
            is_public: false,
            created_by: owner.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn repo(space: &Space, path_name: &str, owner: &str) -> Repo {
        Repo {
            id: 0,
            space_id: space.id,
            path_name: path_name.to_string(),
            path: crate::paths::concatenate(&space.path, path_name),
            description: None,
            is_public: false,
            default_branch: "main".to_string(),
            created_by: owner.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_push_at: None,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"principals".to_string()));
        assert!(tables.contains(&"tokens".to_string()));
        assert!(tables.contains(&"spaces".to_string()));
        assert!(tables.contains(&"repos".to_string()));
        assert!(tables.contains(&"space_grants".to_string()));
    }

    #[test]
    fn test_space_create_and_lookup() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        store.create_principal(&principal("p1")).unwrap();

        let mut root = space(None, "team-a", "p1");
        store.create_space(&mut root).unwrap();
        assert!(root.id > 0);

        let mut child = space(Some(&root), "proj", "p1");
        store.create_space(&mut child).unwrap();

        let fetched = store.get_space(child.id).unwrap().unwrap();
        assert_eq!(fetched.path, "team-a/proj");
        assert_eq!(fetched.parent_id, Some(root.id));

        let by_path = store.get_space_by_path("Team-A/Proj").unwrap().unwrap();
        assert_eq!(by_path.id, child.id);

        assert!(store.get_space(9999).unwrap().is_none());
    }

    #[test]
    fn test_space_duplicate_path_conflicts() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        store.create_principal(&principal("p1")).unwrap();

        store.create_space(&mut space(None, "team-a", "p1")).unwrap();
        let result = store.create_space(&mut space(None, "team-a", "p1"));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_space_missing_parent_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        store.create_principal(&principal("p1")).unwrap();

        let mut orphan = space(None, "orphan", "p1");
        orphan.parent_id = Some(42);
        let result = store.create_space(&mut orphan);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_concurrent_duplicate_creates_exactly_one_succeeds() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(test_store(&temp));
        store.create_principal(&principal("p1")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create_space(&mut space(None, "race", "p1")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(Error::Conflict(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn test_repo_path_collides_with_space() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        store.create_principal(&principal("p1")).unwrap();

        let mut root = space(None, "team-a", "p1");
        store.create_space(&mut root).unwrap();
        store.create_space(&mut space(Some(&root), "proj", "p1")).unwrap();

        let result = store.create_repo(&mut repo(&root, "proj", "p1"));
        assert!(matches!(result, Err(Error::Conflict(_))));

        let mut r = repo(&root, "service", "p1");
        store.create_repo(&mut r).unwrap();
        let fetched = store.get_repo_by_path("team-a/service").unwrap().unwrap();
        assert_eq!(fetched.id, r.id);
        assert!(fetched.last_push_at.is_none());

        store.update_repo_last_push(r.id).unwrap();
        assert!(store.get_repo(r.id).unwrap().unwrap().last_push_at.is_some());
    }

    #[test]
    fn test_space_grant_upsert() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);
        store.create_principal(&principal("p1")).unwrap();
        store.create_principal(&principal("p2")).unwrap();

        let mut root = space(None, "team-a", "p1");
        store.create_space(&mut root).unwrap();

        let mut grant = SpaceGrant {
            principal_id: "p2".to_string(),
            space_id: root.id,
            allow_bits: Permission::SPACE_VIEW,
            deny_bits: Permission::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.upsert_space_grant(&grant).unwrap();

        grant.allow_bits = Permission::SPACE_CREATE;
        store.upsert_space_grant(&grant).unwrap();

        let fetched = store.get_space_grant("p2", root.id).unwrap().unwrap();
        assert_eq!(fetched.allow_bits, Permission::SPACE_CREATE);
        assert_eq!(store.list_principal_space_grants("p2").unwrap().len(), 1);

        assert!(store.delete_space_grant("p2", root.id).unwrap());
        assert!(!store.delete_space_grant("p2", root.id).unwrap());
    }

    #[test]
    fn test_token_lookup_collision() {
        let temp = TempDir::new().unwrap();
        let store = test_store(&temp);

        let token1 = Token {
            id: "token-1".to_string(),
            token_hash: "hash1".to_string(),
            token_lookup: "lookup123".to_string(),
            is_admin: true,
            principal_id: None,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };
        store.create_token(&token1).unwrap();
        assert!(store.has_admin_token().unwrap());

        let token2 = Token {
            id: "token-2".to_string(),
            token_hash: "hash2".to_string(),
            token_lookup: "lookup123".to_string(), // Same lookup
            is_admin: true,
            principal_id: None,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };

        let result = store.create_token(&token2);
        assert!(matches!(result, Err(Error::TokenLookupCollision)));
    }
}
