#[path = "integration/common.rs"]
mod common;

#[path = "integration/runtime_spawn.rs"]
mod runtime_spawn;

#[path = "integration/tool_surface.rs"]
mod tool_surface;

#[path = "integration/geometry_tools.rs"]
mod geometry_tools;

#[path = "integration/stats_tools.rs"]
mod stats_tools;

#[path = "integration/storage_tools.rs"]
mod storage_tools;

#[path = "integration/map_tools.rs"]
mod map_tools;
