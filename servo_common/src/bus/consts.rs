//! Bus constants: control-table item names and interface defaults.

/// Canonical service name (used for logging).
pub const SERVO_SERVICE_NAME: &str = "servo_hal";

/// Joint name that designates the gripper device.
pub const GRIPPER_JOINT_NAME: &str = "gripper";

/// Current limit applied to the gripper when none is configured [A].
pub const DEFAULT_GRIPPER_CURRENT_LIMIT: f64 = 0.3;

/// Goal position register.
pub const GOAL_POSITION_ITEM: &str = "Goal_Position";
/// Goal velocity register.
pub const GOAL_VELOCITY_ITEM: &str = "Goal_Velocity";
/// Goal current register.
pub const GOAL_CURRENT_ITEM: &str = "Goal_Current";
/// Legacy goal velocity register.
pub const MOVING_SPEED_ITEM: &str = "Moving_Speed";
/// Present position register.
pub const PRESENT_POSITION_ITEM: &str = "Present_Position";
/// Present velocity register.
pub const PRESENT_VELOCITY_ITEM: &str = "Present_Velocity";
/// Legacy present velocity register.
pub const PRESENT_SPEED_ITEM: &str = "Present_Speed";
/// Present current register.
pub const PRESENT_CURRENT_ITEM: &str = "Present_Current";
/// Legacy present current register (load-sensing devices).
pub const PRESENT_LOAD_ITEM: &str = "Present_Load";
/// Torque enable register.
pub const TORQUE_ENABLE_ITEM: &str = "Torque_Enable";
/// Operating mode register.
pub const OPERATING_MODE_ITEM: &str = "Operating_Mode";
/// Model number register.
pub const MODEL_NUMBER_ITEM: &str = "Model_Number";
/// Clockwise angle limit register (legacy mode selection).
pub const CW_ANGLE_LIMIT_ITEM: &str = "CW_Angle_Limit";
/// Counter-clockwise angle limit register (legacy mode selection).
pub const CCW_ANGLE_LIMIT_ITEM: &str = "CCW_Angle_Limit";
