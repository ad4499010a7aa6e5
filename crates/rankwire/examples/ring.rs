//! Pass a counter once around the ring of ranks.
//!
//! Run under the launcher:
//!
//! ```text
//! cargo build --examples
//! rankwire-launch 4 target/debug/examples/ring
//! ```

use rankwire::{World, WorldOptions};

const TOKEN_TAG: i32 = 1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut world = World::init(WorldOptions::default())?;
    let rank = world.rank();
    let size = world.size();

    let next = (rank + 1) % size;
    let prev = (rank + size - 1) % size;

    let mut token = [0u8; 8];
    if rank == 0 && size > 1 {
        world.send(&1u64.to_le_bytes(), next, TOKEN_TAG)?;
        world.recv(&mut token, prev, TOKEN_TAG)?;
        println!("token came back as {}", u64::from_le_bytes(token));
    } else if size > 1 {
        world.recv(&mut token, prev, TOKEN_TAG)?;
        let count = u64::from_le_bytes(token) + 1;
        world.send(&count.to_le_bytes(), next, TOKEN_TAG)?;
    }

    world.finalize();
    Ok(())
}
