use std::time::SystemTime;

use rand::Rng;

use pbdcloth::cloth::ClothLod;
use pbdcloth::geometry::{Sphere, TaperedCapsule};
use pbdcloth::{Cloth, ClothConfig, Collider, Solver, SolverConfig, Transform, V3};

fn main() {
	let start = SystemTime::now();
	let config = SolverConfig::default()
		.with_num_substeps(2)
		.with_num_iterations(4)
		.with_wind_velocity(V3::new(2., 1., 0.));
	let mut solver = Solver::new(config);
	let mut rng = rand::thread_rng();
	for n in 0..4 {
		let mut lod = ClothLod::grid(32, 32, 0.05);
		for p in lod.positions.iter_mut().skip(32) {
			p.y += rng.gen_range(-0.01..0.01);
		}
		let cloth = match Cloth::new(ClothConfig::default(), vec![lod]) {
			Ok(cloth) => cloth,
			Err(e) => {
				eprintln!("{}", e);
				return;
			}
		};
		let transform = Transform::translation(2.0 * n as f32, 0., 0.);
		if let Err(e) = solver.add_cloth(cloth, 0, transform) {
			eprintln!("{}", e);
			return;
		}
	}
	solver.add_collider(
		Collider::default()
			.with_shape(Sphere::new(V3::new(0.8, 0.3, -0.8), 0.4))
			.with_shape(TaperedCapsule::new(
				V3::new(2.0, 0.3, -1.0),
				V3::new(7.0, 0.3, -1.0),
				0.3,
				0.1,
			)),
	);
	let dt = 1.0 / 60.0;
	let rframes = 100;
	for _ in 0..rframes {
		solver.update(dt);
	}
	let time = rframes as f32 * dt;
	let duration = SystemTime::now()
		.duration_since(start)
		.map(|d| d.as_micros())
		.unwrap_or_default();
	eprintln!("{:?}", solver.stats());
	eprintln!("{:.3}%", duration as f32 / time / 1e4);
}
