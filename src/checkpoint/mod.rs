mod state;
mod store;

pub use state::{Checkpoint, CheckpointValue};
pub use store::{
    load_best_model, load_checkpoint, load_state_dict, save_checkpoint, save_state_dict,
    BEST_MODEL_FILENAME, CHECKPOINT_FILENAME,
};
