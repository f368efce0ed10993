pub use {anyhow,
         indexmap,
         itertools,
         log,
         ndarray,
         pretty_env_logger,
         rand,
         rayon,
         serde,
         serde_json,
         statrs};
