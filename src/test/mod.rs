mod network_graph;
mod socket;
