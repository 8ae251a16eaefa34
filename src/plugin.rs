use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};
use tracing::warn;

use crate::{request::SurfaceRequest, surface::Surface};

/// System sets for the surface pipeline.
///
/// ```text
/// IsosurfaceSet::Spawn   →  [async compute]  →  IsosurfaceSet::Generate  →  [your systems]  →  IsosurfaceSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsosurfaceSet {
    /// Spawns an async compute task for each queued source.
    Spawn,
    /// Polls async tasks and inserts [`SurfaceBuffers`] on completion.
    Generate,
    /// Uploads [`SurfaceBuffers`] into a Bevy [`Mesh3d`].
    Upload,
}

/// A surface request attached to an entity; the finished mesh lands on the same entity.
#[derive(Component, Clone, Debug)]
#[require(Transform)]
pub struct IsosurfaceSource {
    pub request: SurfaceRequest,
}

impl IsosurfaceSource {
    pub fn new(request: SurfaceRequest) -> Self {
        Self { request }
    }
}

/// Marker for sources waiting to be computed.
#[derive(Component)]
pub struct QueuedSurface;

/// Holds the in-flight computation for an [`IsosurfaceSource`].
#[derive(Component)]
pub struct ComputeTask(Task<Option<SurfaceBuffers>>);

/// Renderer-ready vertex data.
///
/// Triangles touching an invalid vertex are left out of `indices`; the
/// vertex itself stays so indices keep matching the surface.
#[derive(Component, Clone, Debug, Default)]
pub struct SurfaceBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl From<&Surface> for SurfaceBuffers {
    fn from(surface: &Surface) -> Self {
        let mut mesh = surface.mesh.clone();
        if mesh.normals.len() != mesh.vertex_count() {
            mesh.create_normals(&[]);
        }
        let indices = mesh
            .tris
            .iter()
            .filter(|tri| tri.iter().all(|&i| mesh.valid[i]))
            .flat_map(|tri| tri.map(|i| i as u32))
            .collect();
        Self {
            positions: mesh.vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
            normals: mesh.normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
            colors: surface.colors.clone(),
            indices,
        }
    }
}

/// Runtime configuration, inserted by [`IsosurfacePlugin`].
#[derive(Resource)]
pub struct IsosurfaceConfig {
    /// Maximum number of surface tasks spawned per frame. Default: `2`.
    pub max_tasks_per_frame: usize,
}

impl Default for IsosurfaceConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 2,
        }
    }
}

/// Computes every added [`IsosurfaceSource`] on the async compute pool:
///
/// ```text
/// IsosurfaceSource added
///   → QueuedSurface inserted        (on_source_add)
///   → ComputeTask spawned           (IsosurfaceSet::Spawn)
///   → SurfaceBuffers inserted       (IsosurfaceSet::Generate)
///   → Mesh3d inserted               (IsosurfaceSet::Upload)
/// ```
pub struct IsosurfacePlugin {
    pub max_tasks_per_frame: usize,
}

impl Default for IsosurfacePlugin {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: IsosurfaceConfig::default().max_tasks_per_frame,
        }
    }
}

impl Plugin for IsosurfacePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(IsosurfaceConfig {
            max_tasks_per_frame: self.max_tasks_per_frame,
        })
        .configure_sets(
            Update,
            (
                IsosurfaceSet::Spawn,
                IsosurfaceSet::Generate,
                IsosurfaceSet::Upload,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                on_source_add,
                spawn_surface_tasks.in_set(IsosurfaceSet::Spawn),
                poll_surface_tasks.in_set(IsosurfaceSet::Generate),
                upload_surface.in_set(IsosurfaceSet::Upload),
            ),
        );
    }
}

fn on_source_add(
    mut commands: Commands,
    query: Query<Entity, (Added<IsosurfaceSource>, Without<QueuedSurface>)>,
) {
    for entity in query.iter() {
        commands.entity(entity).insert(QueuedSurface);
    }
}

fn spawn_surface_tasks(
    mut commands: Commands,
    config: Res<IsosurfaceConfig>,
    query: Query<
        (Entity, &IsosurfaceSource),
        (With<QueuedSurface>, Without<ComputeTask>, Without<SurfaceBuffers>),
    >,
) {
    let task_pool = AsyncComputeTaskPool::get();
    for (entity, source) in query.iter().take(config.max_tasks_per_frame) {
        let request = source.request.clone();
        let task = task_pool.spawn(async move {
            match request.run() {
                Ok(surface) => Some(SurfaceBuffers::from(&surface)),
                Err(error) => {
                    warn!(%error, "surface request failed");
                    None
                }
            }
        });
        commands.entity(entity).insert(ComputeTask(task));
    }
}

/// Non-blocking: unfinished tasks are retried next frame. A failed request
/// drops its queue marker so it is not retried.
fn poll_surface_tasks(mut commands: Commands, mut query: Query<(Entity, &mut ComputeTask)>) {
    for (entity, mut task) in query.iter_mut() {
        if let Some(buffers) = block_on(future::poll_once(&mut task.0)) {
            let mut entity = commands.entity(entity);
            entity.remove::<ComputeTask>();
            match buffers {
                Some(buffers) => {
                    entity.insert(buffers);
                }
                None => {
                    entity.remove::<QueuedSurface>();
                }
            }
        }
    }
}

fn upload_surface(
    mut commands: Commands,
    query: Query<(Entity, &SurfaceBuffers), With<QueuedSurface>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, buffers) in query.iter() {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD,
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, buffers.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, buffers.normals.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, buffers.colors.clone());
        mesh.insert_indices(Indices::U32(buffers.indices.clone()));

        commands
            .entity(entity)
            .insert(Mesh3d(meshes.add(mesh)))
            .remove::<QueuedSurface>();
    }
}
