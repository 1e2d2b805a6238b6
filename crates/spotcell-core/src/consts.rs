/// Section delimiter of the parameter log. The double space is part of the format.
pub const QUANTIFICATION_SECTION: &str = "Quantification  Parameters";

/// File name of the append-only parameter log inside a working directory.
pub const PARAMETER_LOG_FILE: &str = "Parameters.txt";

/// Default first line written to a parameter log.
pub const DEFAULT_LOG_HEADER: &str = "spotcell parameters";

/// Default ending pattern: underscore, `w`, one digit (e.g. `_w1`).
pub const DEFAULT_ENDING_PATTERN: &str = "_w#";

/// Default Cellpose model for nuclei.
pub const DEFAULT_CELLPOSE_NUCLEI_MODEL: &str = "nuclei";

/// Default Cellpose model for whole cells.
pub const DEFAULT_CELLPOSE_CELL_MODEL: &str = "cyto2";

/// Default expected object diameter in pixels for Cellpose.
pub const DEFAULT_CELLPOSE_DIAMETER: f64 = 30.0;

/// Default StarDist model.
pub const DEFAULT_STARDIST_MODEL: &str = "Versatile (fluorescent nuclei)";

/// Default StarDist normalization percentiles.
pub const DEFAULT_STARDIST_PERCENTILE_LOW: f64 = 1.0;
pub const DEFAULT_STARDIST_PERCENTILE_HIGH: f64 = 99.8;

/// Default StarDist probability and overlap thresholds.
pub const DEFAULT_STARDIST_PROB_THRESHOLD: f64 = 0.5;
pub const DEFAULT_STARDIST_NMS_THRESHOLD: f64 = 0.4;

/// Default minimum object size (pixels) for threshold segmentation.
pub const DEFAULT_MIN_OBJECT_SIZE: f64 = 50.0;

/// Default minimum spot size (pixels) for threshold spot detection.
pub const DEFAULT_MIN_SPOT_SIZE: f64 = 2.0;

/// Default prominence for find-maxima spot detection.
pub const DEFAULT_MAXIMA_PROMINENCE: f64 = 500.0;

/// Default minimal cytoplasm size, as a percentage of the cell area.
pub const DEFAULT_MIN_CYTOPLASM_PERCENT: f64 = 0.0;
