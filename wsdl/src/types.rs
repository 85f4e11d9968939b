#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Port {
    pub name: Option<String>,
    pub binding: Option<String>,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    pub name: Option<String>,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortType {
    pub name: Option<String>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOperation {
    pub name: String,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: Option<String>,
    pub ty: Option<String>,
    pub operations: Vec<BindingOperation>,
}

/// A parsed WSDL document.
///
/// Only the parts needed to locate and call a service are kept. Everything
/// is stored in document order, so "first" always means first in the source.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub target_namespace: Option<String>,
    pub port_types: Vec<PortType>,
    pub bindings: Vec<Binding>,
    pub services: Vec<Service>,
}

impl Definition {
    /// The first address of the first port of the first service.
    pub fn first_address(&self) -> Option<&Address> {
        self.services
            .first()?
            .ports
            .first()?
            .addresses
            .first()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.services
            .iter()
            .flat_map(|service| service.ports.iter())
            .flat_map(|port| port.addresses.iter())
    }

    /// Operation names in declaration order, without duplicates.
    ///
    /// Port types are authoritative; bindings are only consulted when the
    /// document declares no port type operations at all.
    pub fn operations(&self) -> Vec<Operation> {
        let mut result: Vec<Operation> = Vec::new();

        let declared = self
            .port_types
            .iter()
            .flat_map(|ty| ty.operations.iter().cloned());

        for operation in declared {
            if !result.iter().any(|known| known.name == operation.name) {
                result.push(operation);
            }
        }

        if result.is_empty() {
            for operation in self.binding_operations() {
                if !result.iter().any(|known| known.name == operation.name) {
                    result.push(Operation {
                        name: operation.name.clone(),
                        documentation: None,
                    });
                }
            }
        }

        result
    }

    pub fn binding_operations(&self) -> impl Iterator<Item = &BindingOperation> {
        self.bindings
            .iter()
            .flat_map(|binding| binding.operations.iter())
    }

    /// The `soapAction` declared for `operation` by the first binding that
    /// mentions it.
    pub fn soap_action(&self, operation: &str) -> Option<&str> {
        self.binding_operations()
            .find(|candidate| candidate.name == operation)
            .and_then(|candidate| candidate.action.as_deref())
    }
}
