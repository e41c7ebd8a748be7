//! Opening the on-disk ledger.

use crate::config::CliConfig;
use cipher_grant_crypto::{check_keystore, create_keystore, decrypt_keystore, EnvelopeSealer};
use cipher_grant_governance::{GrantLifecycle, LifecycleEvent};
use cipher_grant_storage::FileJournal;
use cipher_grant_types::Hash;
use std::sync::Arc;

/// Create the sealing keystore. Refuses to replace an existing one, since
/// budgets already sealed under it could no longer be revealed.
pub fn init_keystore(config: &CliConfig, password: &str) -> anyhow::Result<Hash> {
    let path = config.storage.keystore_path();
    if path.exists() {
        anyhow::bail!("Keystore already exists at {}", path.display());
    }
    if password.is_empty() {
        anyhow::bail!("Keystore password cannot be empty");
    }

    let key = create_keystore(password, &path, &config.keystore.kdf_params())?;
    Ok(key.key_id())
}

/// Unlock the sealing key and replay the journal.
pub fn open_ledger(config: &CliConfig, password: &str) -> anyhow::Result<GrantLifecycle> {
    let keystore_path = config.storage.keystore_path();
    if !check_keystore(&keystore_path) {
        anyhow::bail!(
            "No sealing keystore at {}; run `cipher-grant init` first",
            keystore_path.display()
        );
    }

    let key = decrypt_keystore(&keystore_path, password)?;
    let sealer = EnvelopeSealer::new(&key);
    tracing::debug!(key_id = %sealer.key_id().short(), "Sealing key unlocked");

    let journal =
        FileJournal::<LifecycleEvent>::open(&config.storage.ledger_path(), config.storage.sync_writes)?;

    let lifecycle = GrantLifecycle::restore(
        config.governance.clone(),
        Arc::new(sealer),
        Arc::new(journal),
    )?;
    Ok(lifecycle)
}
