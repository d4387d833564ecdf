pub mod normalize_op;
pub mod op_helper;
pub mod video_record_op;
