//! Grid state core: cell/range selection, edit sessions and the
//! filter → sort → group → page data pipeline.

pub mod io;
pub mod pipeline;
pub mod state;
