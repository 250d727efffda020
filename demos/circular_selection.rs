//! Circular selection example.
//!
//! Shows how the graph builder nets opposing corridors and refuses to draw
//! a selection whose corridors flow in a circle.

use flow_atlas::graph::flow_graph::{build_graph, AggregatedEdge, GraphOutcome};
use rust_decimal_macros::dec;

fn render(title: &str, edges: &[AggregatedEdge], top_k: usize) {
    println!("━━━ {} ━━━\n", title);
    println!("Input edges (top {}):", top_k);
    for edge in edges {
        println!("  {} → {}: {}", edge.source, edge.target, edge.value);
    }
    println!();

    match build_graph(edges, top_k) {
        GraphOutcome::Graph(graph) => {
            println!("Graph with {} nodes:", graph.node_count());
            for edge in graph.edges() {
                println!("  {} → {}: {}", edge.source, edge.target, edge.value);
            }
            if graph.edge_count() == 0 {
                println!("  (no edges left after netting)");
            }
        }
        GraphOutcome::CycleDetected(report) => {
            println!("{}", report);
            for component in &report.components {
                let names: Vec<&str> = component.iter().map(|n| n.as_str()).collect();
                println!("  Circular group: {}", names.join(", "));
            }
        }
    }
    println!();
}

fn main() {
    println!("╔════════════════════════════════════════════╗");
    println!("║  flow-atlas: Circular Selection Detection  ║");
    println!("╚════════════════════════════════════════════╝\n");

    // Opposing corridors collapse into their net direction.
    render(
        "Scenario 1: Bilateral netting",
        &[
            AggregatedEdge::new("Venezuela", "Colombia", dec!(2_400)),
            AggregatedEdge::new("Colombia", "Venezuela", dec!(350)),
        ],
        10,
    );

    // Equal opposing corridors leave no direction to draw.
    render(
        "Scenario 2: Balanced exchange",
        &[
            AggregatedEdge::new("Spain", "Portugal", dec!(800)),
            AggregatedEdge::new("Portugal", "Spain", dec!(800)),
        ],
        10,
    );

    // Three distinct corridors that close a loop.
    render(
        "Scenario 3: Trilateral cycle",
        &[
            AggregatedEdge::new("Colombia", "Ecuador", dec!(500)),
            AggregatedEdge::new("Ecuador", "Peru", dec!(420)),
            AggregatedEdge::new("Peru", "Colombia", dec!(390)),
            AggregatedEdge::new("Venezuela", "Colombia", dec!(2_400)),
        ],
        10,
    );

    // The same corridors with a tighter top-K drop the loop's weakest edge.
    render(
        "Scenario 4: Top-K breaks the loop",
        &[
            AggregatedEdge::new("Colombia", "Ecuador", dec!(500)),
            AggregatedEdge::new("Ecuador", "Peru", dec!(420)),
            AggregatedEdge::new("Peru", "Colombia", dec!(390)),
            AggregatedEdge::new("Venezuela", "Colombia", dec!(2_400)),
        ],
        3,
    );
}
