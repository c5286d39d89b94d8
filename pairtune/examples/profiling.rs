use pairtune::{LennardJones, PairwiseEngine};

#[path = "lennard-jones.rs"]
#[allow(dead_code)]
mod lennard_jones;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // enable collection of profiling data
    time_graph::enable_data_collection(true);
    // clear any existing collected data
    time_graph::clear_collected_data();

    let (mut engine, functor): (PairwiseEngine, LennardJones) = lennard_jones::setup()?;
    time_graph::spanned!("Full simulation", {
        lennard_jones::run(&mut engine, &functor, 100)
    })?;

    // get the call graph and display it
    // (this requires the "table" feature for the time_graph crate)
    let graph = time_graph::get_full_graph();
    println!("{}", graph.as_short_table());

    // also available for saving profiling data to the disk & future analysis
    // (this requires the "json" feature for the time_graph crate)
    println!("{}", graph.as_json());

    Ok(())
}
