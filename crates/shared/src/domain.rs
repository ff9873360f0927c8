/// State-field names starting with this prefix are excluded from the
/// observable state handed to the template context.
pub const PRIVATE_FIELD_PREFIX: &str = "_";

/// Reserved template-context key the render pipeline injects the instance id
/// under. Component state must not use it.
pub const INSTANCE_ID_KEY: &str = "hy_id";

/// Attribute on the wrapper element naming the component type.
pub const COMPONENT_ATTR: &str = "hy-vm";

/// Container id the full-page render reserves for the client's
/// channel-management script to attach to.
pub const PAGE_CONTAINER_ID: &str = "hy-root";
