//! End-to-end solves through the public API.

use collapse_core::{
    parse_tileset, solve_with_retries, Direction, Observation, RetryPolicy, RngKind, Ruleset,
    RulesetBuilder, RunConfig, SolverConfig, SolverState, StdRandom, WfcSolver,
};

const COAST: &str = r#"
<tileset>
    <tiles>
        <tile name="sea" weight="4"/>
        <tile name="sand" weight="1"/>
        <tile name="grass" weight="2"/>
    </tiles>
    <neighbors>
        <neighbor left="sea" right="sea"/>
        <neighbor left="sea" right="sand"/>
        <neighbor left="sand" right="sea"/>
        <neighbor left="sand" right="sand"/>
        <neighbor left="sand" right="grass"/>
        <neighbor left="grass" right="sand"/>
        <neighbor left="grass" right="grass"/>
        <neighbor top="sea" bottom="sea"/>
        <neighbor top="sea" bottom="sand"/>
        <neighbor top="sand" bottom="sea"/>
        <neighbor top="sand" bottom="sand"/>
        <neighbor top="sand" bottom="grass"/>
        <neighbor top="grass" bottom="sand"/>
        <neighbor top="grass" bottom="grass"/>
    </neighbors>
</tileset>
"#;

fn assert_valid(tiles: &[usize], width: usize, height: usize, rules: &Ruleset, periodic: bool) {
    for y in 0..height {
        for x in 0..width {
            let here = tiles[y * width + x];
            if x + 1 < width || periodic {
                let right = tiles[y * width + (x + 1) % width];
                assert!(
                    rules.is_allowed(here, Direction::Right, right),
                    "({}, {}) {} | {}",
                    x,
                    y,
                    here,
                    right
                );
            }
            if y + 1 < height || periodic {
                let below = tiles[((y + 1) % height) * width + x];
                assert!(
                    rules.is_allowed(here, Direction::Down, below),
                    "({}, {}) {} / {}",
                    x,
                    y,
                    here,
                    below
                );
            }
        }
    }
}

#[test]
fn coast_tileset_produces_valid_grids() {
    let rules = parse_tileset(COAST).unwrap();
    let sea = rules.tile_index("sea").unwrap();
    let grass = rules.tile_index("grass").unwrap();
    assert!(!rules.is_allowed(sea, Direction::Right, grass));

    for periodic in [false, true] {
        let config = SolverConfig::new(12, 9).periodic(periodic);
        let policy = RetryPolicy {
            tries: 20,
            ..Default::default()
        };
        let mut seeds = StdRandom::from_seed(17);

        let solution = solve_with_retries(&config, &rules, &policy, &mut seeds).unwrap();
        assert_eq!(solution.tiles.len(), 12 * 9);
        assert_valid(&solution.tiles, 12, 9, &rules, periodic);
    }
}

#[test]
fn alternating_pair_on_two_cells() {
    let mut builder = RulesetBuilder::new();
    let a = builder.add_tile("a", 1.0);
    let b = builder.add_tile("b", 1.0);
    builder.allow_all_directions(a, b);
    let rules = builder.build().unwrap();

    for seed in 0..20 {
        let mut solver = WfcSolver::new(SolverConfig::new(2, 1), rules.clone());
        solver.startup().unwrap();
        assert_eq!(solver.run(&mut StdRandom::from_seed(seed)), SolverState::Solved);

        let tiles = solver.observed().unwrap();
        assert_ne!(tiles[0], tiles[1]);
        assert_eq!(solver.tile_at(1, 0), Some(tiles[1]));
        assert_eq!(solver.tile_at(2, 0), None);
    }
}

#[test]
fn contradiction_never_yields_output() {
    let mut builder = RulesetBuilder::new();
    builder.add_tile("a", 1.0);
    builder.add_tile("b", 2.0);
    let rules = builder.build().unwrap();

    let mut solver = WfcSolver::new(SolverConfig::new(3, 3), rules);
    solver.startup().unwrap();
    let mut rng = StdRandom::from_seed(0);

    assert_eq!(solver.observe(&mut rng), Observation::Contradiction);
    assert_eq!(solver.run(&mut rng), SolverState::Contradiction);
    assert!(solver.observed().is_none());
    assert!(solver.tile_at(0, 0).is_none());
}

#[test]
fn identical_seeds_give_identical_runs() {
    let rules = parse_tileset(COAST).unwrap();
    let config = SolverConfig::new(16, 16);

    for kind in [RngKind::Std, RngKind::DotNet] {
        let solve = || {
            let mut solver = WfcSolver::new(config.clone(), rules.clone());
            solver.startup().unwrap();
            let mut rng = kind.build(2718);
            let state = solver.run(rng.as_mut());
            (
                state,
                solver.observed().map(<[usize]>::to_vec),
                solver.contradiction_cell(),
                solver.observations(),
            )
        };
        assert_eq!(solve(), solve());
    }
}

#[test]
fn independent_solvers_run_in_parallel() {
    let rules = parse_tileset(COAST).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let rules = rules.clone();
            std::thread::spawn(move || {
                let mut solver = WfcSolver::new(SolverConfig::new(10, 10), rules);
                solver.startup().unwrap();
                let state = solver.run(&mut StdRandom::from_seed(seed));
                (state, solver.observed().map(<[usize]>::to_vec))
            })
        })
        .collect();

    for handle in handles {
        let (state, tiles) = handle.join().unwrap();
        if state == SolverState::Solved {
            assert_valid(&tiles.unwrap(), 10, 10, &rules, false);
        }
    }
}

#[test]
fn run_config_drives_a_solve() {
    let json = r#"{
        "grid": { "width": 5, "height": 4, "periodic": true },
        "retry": { "tries": 25, "rng": "dot_net" },
        "seed": 3
    }"#;
    let config = RunConfig::from_json(json).unwrap();
    let rules = parse_tileset(COAST).unwrap();

    let mut seeds = StdRandom::from_seed(config.seed);
    let solution = solve_with_retries(&config.grid, &rules, &config.retry, &mut seeds).unwrap();
    assert_eq!((solution.width, solution.height), (5, 4));
    assert_valid(&solution.tiles, 5, 4, &rules, true);
}
