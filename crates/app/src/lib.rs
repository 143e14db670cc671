#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use larder_sync_auth::MemoryIdentityProvider;
use larder_sync_core::{Category, HouseholdId, MealSlot, PartitionKey};
use larder_sync_engine::{EngineConfig, SessionController, SyncState};
use larder_sync_remote::{MemoryDirectory, MemoryRemote};
use larder_sync_stores::{FileLocalStore, LocalStore, MemoryLocalStore, PushHandle, StoreSet};
use time::OffsetDateTime;

const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for per-device slot files. `None` keeps every
    /// device in memory for the life of the process.
    pub data_dir: Option<PathBuf>,
    pub debounce: Duration,
    /// Simulate two accounts sharing a household instead of one account
    /// signed in on two devices.
    pub household: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_values(
            std::env::var("LARDER_DATA_DIR").ok(),
            std::env::var("LARDER_DEBOUNCE_MS").ok(),
            std::env::var("LARDER_HOUSEHOLD").ok(),
        )
    }

    fn from_values(
        data_dir: Option<String>,
        debounce_ms: Option<String>,
        household: Option<String>,
    ) -> anyhow::Result<Self> {
        let debounce = parse_debounce(debounce_ms)?;
        let household = parse_household(household)?;

        Ok(Self {
            data_dir: data_dir.map(PathBuf::from),
            debounce,
            household,
        })
    }
}

fn parse_debounce(value: Option<String>) -> anyhow::Result<Duration> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(EngineConfig::default().debounce),
        Some(raw) => {
            let millis: u64 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("LARDER_DEBOUNCE_MS must be an integer, got {raw:?}"))?;
            Ok(Duration::from_millis(millis))
        }
    }
}

fn parse_household(value: Option<String>) -> anyhow::Result<bool> {
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(anyhow::anyhow!(
            "LARDER_HOUSEHOLD must be true or false, got {other:?}"
        )),
    }
}

/// One simulated install: its own identity session and slot files, its
/// own coordinator, sharing the process-wide remote and directory.
pub struct Device {
    pub label: String,
    pub stores: StoreSet,
    pub controller: SessionController,
}

pub fn build_device(
    label: &str,
    config: &AppConfig,
    remote: Arc<MemoryRemote>,
    directory: Arc<MemoryDirectory>,
) -> anyhow::Result<Device> {
    let local: Arc<dyn LocalStore> = match &config.data_dir {
        Some(root) => Arc::new(FileLocalStore::open(root.join(label))?),
        None => Arc::new(MemoryLocalStore::new()),
    };
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (push, mutations) = PushHandle::channel();
    let stores = StoreSet::open(local.clone(), push);
    let controller = SessionController::start(
        EngineConfig {
            debounce: config.debounce,
        },
        stores.clone(),
        local,
        provider,
        remote,
        directory,
        mutations,
    );

    Ok(Device {
        label: label.to_owned(),
        stores,
        controller,
    })
}

/// Drives a scripted two-device session over in-memory backends and
/// logs what each device observes along the way.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let remote = Arc::new(MemoryRemote::new());
    let directory = Arc::new(MemoryDirectory::new());

    let scenario = if config.household {
        "household"
    } else {
        "shared-account"
    };
    tracing::info!(
        scenario,
        debounce_ms = config.debounce.as_millis() as u64,
        "starting device simulation"
    );

    if config.household {
        household_demo(&config, remote, directory).await
    } else {
        shared_account_demo(&config, remote, directory).await
    }
}

/// One account on two devices: the kitchen tablet stocks the list, the
/// phone shops from it, and the restock flows back to the tablet.
async fn shared_account_demo(
    config: &AppConfig,
    remote: Arc<MemoryRemote>,
    directory: Arc<MemoryDirectory>,
) -> anyhow::Result<()> {
    let kitchen = build_device("kitchen", config, remote.clone(), directory.clone())?;
    let phone = build_device("phone", config, remote, directory)?;

    kitchen
        .controller
        .sign_up("kim@example.com", "hunter2!", "Kim")
        .await?;
    wait_for_state(&kitchen, SyncState::Live).await?;
    tracing::info!(device = %kitchen.label, "signed up and live");

    kitchen
        .stores
        .pantry
        .add_item("rolled oats", 1.0, "kg", Category::Pantry);
    kitchen
        .stores
        .shopping
        .add_item("milk", 2.0, "L", Category::Dairy);
    kitchen
        .stores
        .shopping
        .add_item("apples", 6.0, "pcs", Category::Produce);

    phone
        .controller
        .sign_up("kim@example.com", "hunter2!", "Kim")
        .await?;
    wait_for_state(&phone, SyncState::Live).await?;
    wait_for_shopping_item(&phone, "milk").await?;
    tracing::info!(device = %phone.label, "shopping list arrived");

    // Shop on the phone: tick milk off and restock it into the pantry.
    let list = phone
        .stores
        .shopping
        .active_list()
        .ok_or_else(|| anyhow::anyhow!("no active shopping list on the phone"))?;
    let milk = list
        .items
        .iter()
        .find(|item| item.name == "milk")
        .ok_or_else(|| anyhow::anyhow!("milk never reached the phone"))?;
    phone.stores.shopping.set_checked(milk.id, true);
    let moved = phone.stores.move_checked_to_pantry();
    tracing::info!(device = %phone.label, moved, "checked items restocked");

    wait_for_pantry_item(&kitchen, "milk").await?;
    tracing::info!(
        device = %kitchen.label,
        pantry_items = kitchen.stores.pantry.items().len(),
        "pantry converged"
    );

    kitchen.controller.sign_out().await?;
    wait_for_state(&kitchen, SyncState::Idle).await?;
    tracing::info!(device = %kitchen.label, "signed out, local data kept");

    let Device { controller, .. } = phone;
    controller.shutdown().await;
    let Device { controller, .. } = kitchen;
    controller.shutdown().await;
    Ok(())
}

/// Two accounts that form a household mid-session: once both devices
/// re-resolve their partition, Kim's pantry and Sam's dinner plan land
/// on the shared document.
async fn household_demo(
    config: &AppConfig,
    remote: Arc<MemoryRemote>,
    directory: Arc<MemoryDirectory>,
) -> anyhow::Result<()> {
    let kitchen = build_device("kim-kitchen", config, remote.clone(), directory.clone())?;
    let phone = build_device("sam-phone", config, remote.clone(), directory.clone())?;

    let kim = kitchen
        .controller
        .sign_up("kim@example.com", "hunter2!", "Kim")
        .await?;
    wait_for_state(&kitchen, SyncState::Live).await?;
    kitchen
        .stores
        .pantry
        .add_item("flour", 2.0, "kg", Category::Bakery);

    let sam = phone
        .controller
        .sign_up("sam@example.com", "hunter2!", "Sam")
        .await?;
    wait_for_state(&phone, SyncState::Live).await?;

    // They form a household; each device re-resolves its partition. The
    // kitchen goes first so its pantry seeds the shared document.
    let household = HouseholdId::new();
    directory.assign(kim.user_id.clone(), household);
    directory.assign(sam.user_id.clone(), household);
    tracing::info!(%household, "household created");

    kitchen.controller.refresh_partition();
    wait_for_document(&remote, &PartitionKey::household(household)).await?;

    phone.controller.refresh_partition();
    wait_for_pantry_item(&phone, "flour").await?;
    tracing::info!(device = %phone.label, "household pantry arrived");

    let tonight = OffsetDateTime::now_utc().date();
    phone
        .stores
        .meal_plans
        .plan(tonight, MealSlot::Dinner, "Mushroom risotto");
    wait_until("the kitchen sees tonight's plan", || {
        !kitchen.stores.meal_plans.entries().is_empty()
    })
    .await?;
    tracing::info!(device = %kitchen.label, "dinner plan arrived");

    let Device { controller, .. } = phone;
    controller.shutdown().await;
    let Device { controller, .. } = kitchen;
    controller.shutdown().await;
    Ok(())
}

async fn wait_for_state(device: &Device, target: SyncState) -> anyhow::Result<()> {
    let mut state = device.controller.watch_state();
    let result = match tokio::time::timeout(WAIT, state.wait_for(|current| *current == target)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(anyhow::anyhow!("sync engine stopped before {target}")),
        Err(_) => Err(anyhow::anyhow!(
            "timed out waiting for {} to reach {target}",
            device.label
        )),
    };
    result
}

async fn wait_for_pantry_item(device: &Device, name: &str) -> anyhow::Result<()> {
    wait_until(&format!("{} has {name} in the pantry", device.label), || {
        device.stores.pantry.items().iter().any(|item| item.name == name)
    })
    .await
}

async fn wait_for_shopping_item(device: &Device, name: &str) -> anyhow::Result<()> {
    wait_until(&format!("{} has {name} on the list", device.label), || {
        device
            .stores
            .shopping
            .active_list()
            .is_some_and(|list| list.items.iter().any(|item| item.name == name))
    })
    .await
}

async fn wait_for_document(remote: &MemoryRemote, partition: &PartitionKey) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if remote.document(partition).await.is_some() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow::anyhow!("timed out waiting for {partition} to be seeded"));
        }
        tokio::time::sleep(POLL).await;
    }
}

async fn wait_until(description: &str, mut probe: impl FnMut() -> bool) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !probe() {
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow::anyhow!("timed out waiting until {description}"));
        }
        tokio::time::sleep(POLL).await;
    }
    Ok(())
}
