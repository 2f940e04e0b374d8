pub mod loop_heartbeats;
