pub mod decode;
pub mod model;

use crate::scene::texture::{TextureId, TextureKind, TextureSettings, TextureData};
use crate::scene::{NodeId, Scene};
use model::ModelData;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to import glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF {path} contains no triangle meshes")]
    EmptyModel { path: String },
    #[error("cube face {path} is {found:?}, expected {expected:?}")]
    CubeFaceSize {
        path: String,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("failed to start asset worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Handle for an in-flight model load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelRequest(u64);

/// Runs once a model has been added to the scene, with the model's root node.
pub type ModelSetup = Box<dyn FnOnce(&mut Scene, NodeId)>;

enum AssetRequest {
    Texture {
        id: TextureId,
        path: PathBuf,
        generate_mipmaps: bool,
    },
    Cube {
        id: TextureId,
        paths: [PathBuf; 6],
    },
    Model {
        request: ModelRequest,
        path: PathBuf,
    },
}

pub enum AssetEvent {
    TextureLoaded {
        id: TextureId,
        data: TextureData,
    },
    ModelLoaded {
        request: ModelRequest,
        model: ModelData,
    },
    Failed {
        label: String,
        model: Option<ModelRequest>,
        error: AssetError,
    },
}

/// Loads textures and models on a worker thread.
///
/// Requests return immediately. Results are only applied to the scene by
/// [`AssetLoader::poll`], which the render loop calls once per tick.
pub struct AssetLoader {
    root: PathBuf,
    requests: Option<Sender<AssetRequest>>,
    events: Receiver<AssetEvent>,
    worker: Option<JoinHandle<()>>,
    setups: HashMap<ModelRequest, ModelSetup>,
    next_model: u64,
    in_flight: usize,
}

impl AssetLoader {
    pub fn spawn(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let (request_tx, request_rx) = mpsc::channel::<AssetRequest>();
        let (event_tx, event_rx) = mpsc::channel::<AssetEvent>();
        let worker = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || worker_loop(request_rx, event_tx))
            .map_err(AssetError::Spawn)?;
        Ok(Self {
            root: root.into(),
            requests: Some(request_tx),
            events: event_rx,
            worker: Some(worker),
            setups: HashMap::new(),
            next_model: 0,
            in_flight: 0,
        })
    }

    /// A loader without a worker; completion events are fed through the returned sender.
    #[cfg(test)]
    pub fn detached(root: impl Into<PathBuf>) -> (Self, Sender<AssetEvent>) {
        let (event_tx, event_rx) = mpsc::channel::<AssetEvent>();
        let loader = Self {
            root: root.into(),
            requests: None,
            events: event_rx,
            worker: None,
            setups: HashMap::new(),
            next_model: 0,
            in_flight: 0,
        };
        (loader, event_tx)
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Number of requests whose completion has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn load_texture(&mut self, scene: &mut Scene, path: &str, settings: TextureSettings) -> TextureId {
        let id = scene.textures.reserve(path, TextureKind::Flat, settings);
        self.submit(AssetRequest::Texture {
            id,
            path: self.resolve(path),
            generate_mipmaps: settings.generate_mipmaps,
        });
        id
    }

    /// Faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn load_cube_texture(&mut self, scene: &mut Scene, paths: [&str; 6]) -> TextureId {
        let settings = TextureSettings {
            generate_mipmaps: false,
            ..TextureSettings::srgb()
        };
        let id = scene.textures.reserve(paths[0], TextureKind::Cube, settings);
        let paths = paths.map(|path| self.resolve(path));
        self.submit(AssetRequest::Cube { id, paths });
        id
    }

    pub fn load_model(&mut self, path: &str, setup: ModelSetup) -> ModelRequest {
        let request = ModelRequest(self.next_model);
        self.next_model += 1;
        self.setups.insert(request, setup);
        self.submit(AssetRequest::Model {
            request,
            path: self.resolve(path),
        });
        request
    }

    fn submit(&mut self, request: AssetRequest) {
        self.in_flight += 1;
        let Some(requests) = &self.requests else {
            return;
        };
        if requests.send(request).is_err() {
            log::warn!("Asset worker has stopped; request dropped");
            self.in_flight -= 1;
        }
    }

    /// Applies every completed load to the scene. Returns the number of events handled.
    pub fn poll(&mut self, scene: &mut Scene) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.in_flight > 0 && self.requests.is_some() {
                        log::warn!("Asset worker exited with {} loads pending", self.in_flight);
                        self.in_flight = 0;
                    }
                    break;
                }
            };
            self.in_flight = self.in_flight.saturating_sub(1);
            handled += 1;
            self.apply(scene, event);
        }
        handled
    }

    fn apply(&mut self, scene: &mut Scene, event: AssetEvent) {
        match event {
            AssetEvent::TextureLoaded { id, data } => {
                let (width, height) = (data.width, data.height);
                if scene.textures.fill(id, data) {
                    let label = scene
                        .textures
                        .get(id)
                        .map(|slot| slot.label.as_str())
                        .unwrap_or("texture");
                    log::debug!("Texture {label} ready ({width}x{height})");
                }
            }
            AssetEvent::ModelLoaded { request, model } => {
                let name = model.name.clone();
                let meshes = model.mesh_count();
                let root = model::instantiate(scene, model);
                if let Some(setup) = self.setups.remove(&request) {
                    setup(scene, root);
                }
                log::info!("Model {name} added to scene ({meshes} meshes)");
            }
            AssetEvent::Failed { label, model, error } => {
                if let Some(request) = model {
                    self.setups.remove(&request);
                }
                log::warn!("Asset {label} failed to load: {error}");
            }
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Asset worker panicked");
            }
        }
    }
}

fn worker_loop(requests: Receiver<AssetRequest>, events: Sender<AssetEvent>) {
    while let Ok(request) = requests.recv() {
        let event = match request {
            AssetRequest::Texture {
                id,
                path,
                generate_mipmaps,
            } => match decode::texture_from_file(&path, generate_mipmaps) {
                Ok(data) => AssetEvent::TextureLoaded { id, data },
                Err(error) => AssetEvent::Failed {
                    label: path.display().to_string(),
                    model: None,
                    error,
                },
            },
            AssetRequest::Cube { id, paths } => match decode::cube_from_files(&paths) {
                Ok(data) => AssetEvent::TextureLoaded { id, data },
                Err(error) => AssetEvent::Failed {
                    label: paths[0].display().to_string(),
                    model: None,
                    error,
                },
            },
            AssetRequest::Model { request, path } => match model::import(&path) {
                Ok(model) => AssetEvent::ModelLoaded { request, model },
                Err(error) => AssetEvent::Failed {
                    label: path.display().to_string(),
                    model: Some(request),
                    error,
                },
            },
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
