//! # Two Devices: offline edits reconciled through a sync server
//!
//! A phone and a laptop share one password vault through a server that
//! stores the canonical snapshot. Each device edits offline, then runs a
//! sync cycle: pull the server snapshot, merge, deliver the forward delta,
//! acknowledge.
//!
//! Run: `cargo run -p vault-sync-store --example two_devices`

use serde::{Deserialize, Serialize};
use vault_sync::clock::ManualClock;
use vault_sync::{Collection, Record, Timestamp};
use vault_sync_store::{CollectionDb, MemoryStore, SyncOutcome};

// ── Record type ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Login {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<Timestamp>,
    site: String,
    password: String,
}

impl Record for Login {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn updated(&self) -> Option<Timestamp> {
        self.updated
    }

    fn set_updated(&mut self, at: Timestamp) {
        self.updated = Some(at);
    }
}

fn login(id: &str, site: &str, password: &str) -> Login {
    Login {
        id: id.to_string(),
        updated: None,
        site: site.to_string(),
        password: password.to_string(),
    }
}

const VAULT: &str = "vault";

/// One device sync: merge the server snapshot, then push whatever the
/// server is missing and acknowledge.
fn sync_device(
    name: &str,
    device: &mut CollectionDb<MemoryStore>,
    server: &mut Collection<Login>,
    clock: &ManualClock,
) {
    match device.sync_with(VAULT, server, clock).unwrap() {
        SyncOutcome::Converged {
            applied,
            last_merged,
        } => {
            println!(
                "   {name}: applied {} change(s), nothing to send, watermark {last_merged}",
                applied.len()
            );
        }
        SyncOutcome::Pending(pending) => {
            println!(
                "   {name}: applied {} change(s), sending {} to the server",
                pending.applied.len(),
                pending.forward.len()
            );
            for (kind, record) in pending.forward.iter() {
                println!("      {kind:<8} {} ({})", record.id, record.site);
            }

            // The server adopts the device's merged view.
            *server = device.load(VAULT).unwrap().unwrap_or_default();
            server.set_last_merged(pending.watermark);

            device.acknowledge(&pending).unwrap();
            println!("   {name}: delivery confirmed, watermark {}", pending.watermark);
        }
    }
}

fn main() {
    println!("=== Two Devices Example ===\n");

    let clock = ManualClock::new(1_700_000_000_000);
    let mut server: Collection<Login> = Collection::new();
    let mut phone = CollectionDb::with_store(MemoryStore::new());
    let mut laptop = CollectionDb::with_store(MemoryStore::new());

    // ── Step 1: the phone creates the vault ─────────────────────────
    println!("1. Phone creates two logins and syncs...");
    let mut vault = phone.load_or_default::<Login>(VAULT).unwrap();
    vault.update_with(
        &clock,
        [
            login("gh", "github.com", "hunter2"),
            login("mail", "mail.example", "correct horse"),
        ],
    );
    phone.save(VAULT, &vault).unwrap();

    clock.advance(1_000);
    sync_device("phone", &mut phone, &mut server, &clock);

    // ── Step 2: the laptop joins ────────────────────────────────────
    println!("\n2. Laptop syncs for the first time...");
    clock.advance(1_000);
    sync_device("laptop", &mut laptop, &mut server, &clock);

    // ── Step 3: both go offline and edit ────────────────────────────
    println!("\n3. Offline edits: phone rotates a password, laptop drops mail...");
    clock.advance(60_000);
    let mut vault = phone.load::<Login>(VAULT).unwrap().unwrap_or_default();
    vault.update_with(&clock, [login("gh", "github.com", "tr0ub4dor&3")]);
    phone.save(VAULT, &vault).unwrap();

    let mut vault = laptop.load::<Login>(VAULT).unwrap().unwrap_or_default();
    vault.remove(["mail".to_string()]);
    laptop.save(VAULT, &vault).unwrap();

    // ── Step 4: reconcile ───────────────────────────────────────────
    println!("\n4. Both devices sync...");
    clock.advance(1_000);
    sync_device("laptop", &mut laptop, &mut server, &clock);
    clock.advance(1_000);
    sync_device("phone", &mut phone, &mut server, &clock);
    clock.advance(1_000);
    sync_device("laptop", &mut laptop, &mut server, &clock);

    // ── Result ──────────────────────────────────────────────────────
    println!("\n=== Result ===");
    let phone_view = phone.load::<Login>(VAULT).unwrap().unwrap_or_default();
    let laptop_view = laptop.load::<Login>(VAULT).unwrap().unwrap_or_default();
    for record in phone_view.iter() {
        println!("   {} {} {}", record.id, record.site, record.password);
    }

    let same = phone_view.iter().eq(laptop_view.iter());
    println!("\n   Devices converged: {same}");
    assert!(same);
}
