//! Weapon recognition worker.
//!
//! Weapon icons are sent to a local backend and then a remote one; a later
//! backend's answers overwrite earlier ones slot by slot. Each backend fails
//! on its own without affecting the other. Finishing a result (weapons, kill
//! attribution, `ResultReady`) can run inline or on a dedicated thread.

use log::{info, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use crate::events::{emit, ScanEvent};
use crate::recognition::kills::analyze_kills;
use crate::recognition::recognizers::{Recognizers, WeaponRecognizer};
use crate::result::GameResult;

/// Fills in `weapon` for every player from the configured backends.
pub fn recognize_weapons(result: &mut GameResult, recognizers: &Recognizers) {
    let icons: Vec<_> = result
        .players
        .iter()
        .map(|p| p.images.weapon.clone())
        .collect();

    for backend in [&recognizers.weapons_local, &recognizers.weapons_remote]
        .into_iter()
        .flatten()
    {
        apply_backend(result, backend.as_ref(), &icons);
    }
}

fn apply_backend(result: &mut GameResult, backend: &dyn WeaponRecognizer, icons: &[image::RgbImage]) {
    match backend.recognize_weapons(icons) {
        Ok(weapons) => {
            for (player, weapon) in result.players.iter_mut().zip(weapons) {
                player.weapon = weapon;
            }
        }
        Err(e) => warn!("Weapon recognition failed in '{}' backend: {:#}", backend.name(), e),
    }
}

/// Completes a result and hands it to the event sink.
pub fn finish_result(mut result: GameResult, recognizers: &Recognizers, events: &Sender<ScanEvent>) {
    info!("Weapon recognition started");
    recognize_weapons(&mut result, recognizers);
    info!("Weapon recognition done");

    if let Some(classifier) = &recognizers.player_names {
        analyze_kills(&mut result, classifier.as_ref());
    }

    emit(events, ScanEvent::ResultReady(Box::new(result)));
}

/// Runs the worker loop until the channel is closed (sender dropped).
///
/// Blocks, so it should run on a dedicated thread.
pub fn run_weapon_worker(receiver: Receiver<GameResult>, recognizers: Recognizers, events: Sender<ScanEvent>) {
    info!("Weapon worker started");
    while let Ok(result) = receiver.recv() {
        finish_result(result, &recognizers, &events);
    }
    info!("Weapon worker: channel closed, exiting");
}

/// Handle to a background weapon worker.
pub struct WeaponWorker {
    sender: Option<Sender<GameResult>>,
    handle: Option<JoinHandle<()>>,
}

impl WeaponWorker {
    pub fn spawn(recognizers: Recognizers, events: Sender<ScanEvent>) -> Self {
        let (sender, receiver) = channel();
        let handle = std::thread::spawn(move || run_weapon_worker(receiver, recognizers, events));
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queues a result. Returns it back if the worker is gone.
    pub fn submit(&self, result: GameResult) -> Result<(), GameResult> {
        match &self.sender {
            Some(sender) => sender.send(result).map_err(|e| e.0),
            None => Err(result),
        }
    }

    /// Closes the queue and waits for queued results to finish.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Weapon worker panicked");
            }
        }
    }
}

impl Drop for WeaponWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
