use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{generate_hook_secret, issue_token};
use crate::config::ServerConfig;
use crate::server::validation::validate_path_name;
use crate::store::{SqliteStore, Store};
use crate::types::{Permission, Principal, SpaceGrant};

use super::init_store;

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

fn write_secret(path: &Path, secret: &str) -> anyhow::Result<()> {
    fs::write(path, secret).with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    set_restrictive_permissions(path);
    Ok(())
}

pub fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: PathBuf::from(data_dir),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = config.admin_token_path();

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let (_, raw_token) = issue_token(&store, None, None)?;
    write_secret(&token_file, &raw_token)?;

    let secret_file = config.hook_secret_path();
    if !secret_file.exists() {
        write_secret(&secret_file, &generate_hook_secret())?;
    }

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("Hook secret written to: {}", secret_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        let create = inquire::Confirm::new("Would you like to create a principal?")
            .with_default(false)
            .prompt()?;
        if create {
            let uid = prompt_uid()?;
            add_principal(&store, &uid, None)?;
        }
    }

    Ok(())
}

fn prompt_uid() -> anyhow::Result<String> {
    let uid = inquire::Text::new("Principal uid:")
        .with_validator(|input: &str| {
            match validate_path_name(&input.trim().to_lowercase(), "Principal") {
                Ok(()) => Ok(inquire::validator::Validation::Valid),
                Err(e) => Ok(inquire::validator::Validation::Invalid(e.to_string().into())),
            }
        })
        .prompt()?;
    Ok(uid.trim().to_lowercase())
}

fn add_principal(store: &dyn Store, uid: &str, display_name: Option<String>) -> anyhow::Result<()> {
    let now = Utc::now();
    let principal = Principal {
        id: Uuid::new_v4().to_string(),
        uid: uid.to_string(),
        display_name: display_name.unwrap_or_else(|| uid.to_string()),
        created_at: now,
        updated_at: now,
    };
    store.create_principal(&principal)?;

    let (_, raw_token) = issue_token(store, Some(principal.id.clone()), None)?;

    println!();
    println!("========================================");
    println!("Created principal '{uid}' ({}) with token:", principal.id);
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}

pub fn run_principal_add(
    data_dir: &str,
    uid: Option<String>,
    display_name: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let store = init_store(data_dir)?;

    let uid = match uid {
        Some(uid) => {
            let uid = uid.trim().to_lowercase();
            validate_path_name(&uid, "Principal")?;
            uid
        }
        None if non_interactive => bail!("--uid is required with --non-interactive"),
        None => prompt_uid()?,
    };

    add_principal(&store, &uid, display_name)
}

pub fn run_grant(
    data_dir: &str,
    principal_uid: &str,
    space_path: &str,
    allow: &[String],
    deny: &[String],
) -> anyhow::Result<()> {
    let store = init_store(data_dir)?;

    let principal = store
        .get_principal_by_uid(&principal_uid.to_lowercase())?
        .with_context(|| format!("principal '{principal_uid}' not found"))?;
    let space = store
        .get_space_by_path(&crate::paths::normalize_ref(space_path))?
        .with_context(|| format!("space '{space_path}' not found"))?;

    let allow_bits = Permission::parse_many(allow).context("invalid permission in --allow")?;
    let deny_bits = Permission::parse_many(deny).context("invalid permission in --deny")?;
    if allow_bits.is_empty() && deny_bits.is_empty() {
        bail!("nothing to grant: pass --allow and/or --deny");
    }

    let now = Utc::now();
    store.upsert_space_grant(&SpaceGrant {
        principal_id: principal.id,
        space_id: space.id,
        allow_bits,
        deny_bits,
        created_at: now,
        updated_at: now,
    })?;

    println!(
        "Granted {} on {}: allow [{}] deny [{}]",
        principal.uid,
        space.path,
        allow_bits.to_strings().join(", "),
        deny_bits.to_strings().join(", ")
    );

    Ok(())
}
