mod block_properties;
mod param_handoff;
mod scheduler_timing;
