use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use vbox_fvm::discretization::box_geometry::BoxGeometry;
use vbox_fvm::discretization::generator::create_regular_2d_grid;
use vbox_fvm::models::pn::{pn_problem_def, PnJunctionModel};
use vbox_fvm::numerics::linear::{DirectSolver, KrylovConfig, KrylovMethod, KrylovSolver, LinearSolver};
use vbox_fvm::numerics::picard::PicardDriver;
use vbox_fvm::numerics::preconditioner::PreconditionerKind;
use vbox_fvm::numerics::{ConvergenceGate, PicardConfig};
use vbox_fvm::physics::assembler::Assembler;
use vbox_fvm::physics::mapping::map_pde;
use vbox_fvm::physics::quantity::{CoefficientId, QuantityId};
use vbox_fvm::physics::state::SimulationState;
use vbox_fvm::physics::{PdeSystem, QuantityOptions};
use vbox_fvm::symbolic::{div, grad, Expr};

const U: QuantityId = QuantityId(0);
const K: CoefficientId = CoefficientId(0);

fn grid_sizes() -> Vec<usize> {
    vec![32, 64, 128]
}

fn diode_sizes() -> Vec<usize> {
    vec![100, 300]
}

fn grid_problem(size: usize) -> (vbox_fvm::discretization::mesh::Mesh, PdeSystem, SimulationState) {
    let mesh = create_regular_2d_grid([1.0, 1.0], size, size, 1.0);
    let system = PdeSystem::new().with(
        div(Expr::coefficient(K) * grad(Expr::unknown(U))).equals(1.0),
        U,
        QuantityOptions::named("u"),
    );
    let mut state = SimulationState::for_mesh(&mesh);
    {
        let u = state.add_quantity(U, 0.0);
        for cell in mesh.cells_on_boundary(|c| c.x < 1e-12) {
            u.set_boundary(cell, 0.0);
        }
    }
    state.set_coefficient(K, 1.0);
    (mesh, system, state)
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembly");
    for &size in &grid_sizes() {
        let (mesh, system, mut state) = grid_problem(size);
        let assembler = Assembler::new(&system).expect("valid system");
        let geometry = BoxGeometry::compute(&mesh);
        map_pde(&system, 0, &mesh, &mut state).expect("mapped");
        group.bench_with_input(BenchmarkId::from_parameter(size * size), &size, |b, &_| {
            b.iter(|| {
                let lin = assembler.assemble(0, &mesh, &geometry, &state).expect("assembled");
                std::hint::black_box(lin);
            });
        });
    }
    group.finish();
}

fn bench_box_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_geometry");
    for &size in &grid_sizes() {
        let mesh = create_regular_2d_grid([1.0, 1.0], size, size, 1.0);
        group.bench_with_input(BenchmarkId::from_parameter(size * size), &size, |b, &_| {
            b.iter(|| std::hint::black_box(BoxGeometry::compute(&mesh)));
        });
    }
    group.finish();
}

fn bench_krylov(c: &mut Criterion) {
    let mut group = c.benchmark_group("krylov");
    let (mesh, system, mut state) = grid_problem(64);
    let assembler = Assembler::new(&system).expect("valid system");
    let geometry = BoxGeometry::compute(&mesh);
    map_pde(&system, 0, &mesh, &mut state).expect("mapped");
    let lin = assembler.assemble(0, &mesh, &geometry, &state).expect("assembled");

    let configs = [
        ("cg_jacobi", KrylovMethod::ConjugateGradient, PreconditionerKind::Jacobi),
        ("bicgstab_ilu0", KrylovMethod::BiCgStab, PreconditionerKind::Ilu0),
        ("gmres30_ilu0", KrylovMethod::Gmres { restart: 30 }, PreconditionerKind::Ilu0),
    ];
    for (name, method, preconditioner) in configs {
        let solver = KrylovSolver::new(KrylovConfig {
            method,
            preconditioner,
            tolerance: 1e-10,
            max_iterations: 5000,
        });
        group.bench_function(name, |b| {
            b.iter(|| std::hint::black_box(solver.solve(&lin.matrix, &lin.rhs).expect("solved")));
        });
    }
    group.finish();
}

fn bench_diode_picard(c: &mut Criterion) {
    let mut group = c.benchmark_group("diode_picard");
    group.sample_size(10);
    for &size in &diode_sizes() {
        let (mesh, params) = pn_problem_def(1.0, size, 0.0);
        let model = PnJunctionModel::new(params);
        let config = PicardConfig::default()
            .with_max_iterations(500)
            .with_break_tolerance(1e-9)
            .with_gate(ConvergenceGate::AllQuantities);
        let driver = PicardDriver::new(config, model.system.clone()).expect("valid system");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || model.initial_state(&mesh),
                |mut state| {
                    let _ = driver.solve(&mesh, &mut state, &DirectSolver);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_assembly,
    bench_box_geometry,
    bench_krylov,
    bench_diode_picard
);
criterion_main!(benches);
