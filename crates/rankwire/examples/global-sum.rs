//! Reduce every rank's contribution at rank 0, then broadcast it back.
//!
//! Run under the launcher:
//!
//! ```text
//! cargo build --examples
//! rankwire-launch 4 target/debug/examples/global-sum
//! ```

use rankwire::{ReduceOp, World, WorldOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut world = World::init(WorldOptions::default())?;
    let root = 0;

    let contribution = [world.rank() as u8; 4];
    let mut total = [0u8; 4];

    if world.rank() == root {
        world.reduce(&contribution, Some(&mut total), ReduceOp::Sum, root)?;
    } else {
        world.reduce(&contribution, None, ReduceOp::Sum, root)?;
    }
    world.broadcast(&mut total, root)?;

    println!("rank {} sees total {:?}", world.rank(), total);

    world.finalize();
    Ok(())
}
