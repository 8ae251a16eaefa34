use bevy::prelude::*;
use jvxl_surface::{
    ColorScheme, FieldKind, IsosurfacePlugin, PhaseFunction, SurfaceRequest,
    field::QuantumNumbers, plugin::IsosurfaceSource,
};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, IsosurfacePlugin::default()))
        .add_systems(Startup, setup)
        .run();
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    bevy::log::info!("Orbital Viewer");

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 6.0, 14.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight::default(),
        Transform::from_xyz(4.0, 8.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Both phases of 3d(z²), red where ψ < 0.
    let request = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(3, 2, 0, 1.0)))
        .with_cutoff(0.02)
        .with_resolution(8.0)
        .with_color_scheme(ColorScheme::phase(PhaseFunction::Z2));

    let material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        cull_mode: None,
        double_sided: true,
        ..default()
    });
    commands.spawn((IsosurfaceSource::new(request), MeshMaterial3d(material)));
}
