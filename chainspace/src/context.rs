use crate::Visibility;

/// Per-definition-body state the compiler threads through method
/// definitions: the visibility `private`/`public`/... with no arguments set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionContext {
    pub visibility: Visibility,
    pub module_function: bool,
}

impl DefinitionContext {
    pub fn new() -> Self {
        Self {
            visibility: Visibility::Public,
            module_function: false,
        }
    }

    pub fn set_default(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::ModuleFunction => self.module_function = true,
            other => {
                self.visibility = other;
                self.module_function = false;
            }
        }
    }
}

impl Default for DefinitionContext {
    fn default() -> Self {
        Self::new()
    }
}
