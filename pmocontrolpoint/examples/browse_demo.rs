//! Découvre les MediaServers du réseau et parcourt la racine du premier trouvé.
//!
//! Usage:
//! ```bash
//! cargo run -p pmocontrolpoint --example browse_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use pmocontrolpoint::{
    BrowseListener, BrowseOptions, BrowseState, ChapterFetchChain, ChapterOptions,
    ContentDirectoryBrowser, ContentObject, ContentSource, ControlPointManager, DeviceListener,
    DeviceProxy, UpnpControlPointFactory,
};
use pmoconfig::get_config;
use tracing_subscriber::EnvFilter;

struct PrintDevices;

impl<P: DeviceProxy> DeviceListener<P> for PrintDevices {
    fn on_discover(&self, device: &Arc<P>) {
        println!("+ {} {} ({})", P::KIND, device.handle().friendly_name(), device.udn());
    }

    fn on_lost(&self, device: &Arc<P>) {
        println!("- {} {}", P::KIND, device.udn());
    }
}

struct PrintBatch;

impl BrowseListener for PrintBatch {
    fn on_batch(&self, batch: &[ContentObject], in_progress: bool) {
        for object in batch {
            let marker = if object.is_container { "/" } else { "" };
            println!("  {}{}", object.title(), marker);
        }
        if !in_progress {
            println!("  -- fin du parcours");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = get_config();
    let level = config.get_log_min_level().unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let manager = ControlPointManager::new(Arc::new(UpnpControlPointFactory::from_config(&config)));
    manager.servers().add_listener(Arc::new(PrintDevices));
    manager.renderers().add_listener(Arc::new(PrintDevices));
    manager.initialize(None)?;

    println!("Recherche des serveurs pendant 5 secondes...");
    std::thread::sleep(Duration::from_secs(5));

    let Some(server) = manager.servers().device_list().into_iter().next() else {
        println!("Aucun MediaServer trouvé");
        manager.terminate();
        return Ok(());
    };

    println!("\nRacine de {}:", server.friendly_name());
    let browser = ContentDirectoryBrowser::new(BrowseOptions::from_config(&config));
    let source: Arc<dyn ContentSource> = server.clone();
    let handle = browser.prepare(source, pmocontrolpoint::ROOT_OBJECT_ID);
    handle.add_listener(Arc::new(PrintBatch));
    handle.start()?;

    match handle.wait(Duration::from_secs(30)) {
        BrowseState::Completed => {}
        BrowseState::Failed => println!("Échec: {}", handle.error().unwrap_or_default()),
        other => println!("Parcours interrompu: {:?}", other),
    }

    let chapters = ChapterFetchChain::with_default_fetchers(&ChapterOptions::from_config(&config));
    for object in handle.results().iter().filter(|o| !o.is_container) {
        let offsets = chapters.resolve(object);
        if !offsets.is_empty() {
            println!("{}: {} chapitres", object.title(), offsets.len());
        }
    }

    manager.terminate();
    Ok(())
}
