use std::path::PathBuf;

use anyhow::Context;
use ark_ec::CurveGroup;
use ark_ed_on_bls12_377::EdwardsProjective;
use ark_std::UniformRand;
use clap::Parser;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use msm_bench::{
    case_path, msm_big_int, timed, write_case, CaseId, Point, RandomScalarSampler, ScalarSampler,
    TestVectorSet,
};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Writes precomputed 2^k MSM cases as JSON.", long_about = None)]
struct Args {
    /// Output directory for <k>.json files.
    #[clap(long, value_parser, default_value = "./test-data")]
    dir: PathBuf,

    /// Smallest exponent to generate.
    #[clap(long, value_parser, default_value_t = 0)]
    min: u32,

    /// Largest exponent to generate.
    #[clap(long, value_parser, default_value_t = 12)]
    max: u32,

    /// Seed for points and scalars.
    #[clap(short, long, value_parser, default_value_t = 0)]
    seed: u64,
}

fn random_point(rng: &mut ChaChaRng) -> Point {
    let affine = EdwardsProjective::rand(rng).into_affine();
    Point::new(
        affine.x.into(),
        affine.y.into(),
        (affine.x * affine.y).into(),
        1u8.into(),
    )
}

fn generate(
    case: CaseId,
    rng: &mut ChaChaRng,
    sampler: &RandomScalarSampler,
) -> anyhow::Result<TestVectorSet> {
    let points: Vec<_> = (0..case.size()).map(|_| random_point(rng)).collect();
    let scalars = sampler.sample_scalars(case.size());
    let expected = timed("computing expected result", || msm_big_int(&points, &scalars))
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(TestVectorSet::new(points, scalars, Some(expected.coordinates()))?)
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    let args = Args::parse();

    let mut rng = ChaChaRng::seed_from_u64(args.seed);
    let sampler = RandomScalarSampler::from_seed(args.seed.wrapping_add(1));

    for exponent in args.min..=args.max {
        let case = CaseId::new(exponent)?;
        let vectors = generate(case, &mut rng, &sampler)?;
        let path = case_path(&args.dir, case);
        write_case(&path, &vectors).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {} ({} vectors)", path.display(), vectors.len());
    }
    Ok(())
}
