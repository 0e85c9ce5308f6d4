use crate::error::FaultMeshError;

/// Description and default unit of a material parameter
pub fn parameter_info(id: &str) -> (&'static str, &'static str) {
    match id {
        "E" => ("Elasticity modulus", "kPa"),
        "nu" => ("Poisson ratio", ""),
        "K" => ("Hydraulic permeability", "m/s"),
        "gw" => ("Specific weight of water", "kN/m3"),
        "Pht" => ("Porosity", ""),
        "Bp" => ("Pore compressibility", "kPa^-1"),
        "Kww" => ("Water bulk modulus", "kPa"),
        "Kss" => ("Bulk modulus of grains", "kPa"),
        "uf" => ("Dynamic fluid viscosity", "kPa*s"),
        "gr" => ("Gravity acceleration", "m/s2"),
        "rhob" => ("Bulk density", "kg/m3"),
        "Kn" => ("Normal elastic stiffness", "kPa/m"),
        "Ks" => ("Shear elastic stiffness", "kPa/m"),
        "Cf" => ("Fault cohesion", "kPa"),
        "Phif" => ("Fault friction angle", "degree"),
        "Psif" => ("Fault dilation angle", "degree"),
        "Tcut" => ("Tension Cut-off", ""),
        "Gap" => ("Initial gap opening", "m"),
        "Lkt" => ("Leakoff at top", "m/(kPa*s)"),
        "Lkb" => ("Leakoff at bottom", "m/(kPa*s)"),
        "Iopen" => ("Initially open element", ""),
        _ => ("", ""),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Elastic {
        e: f64,
        nu: f64,
    },
    PoroElastic {
        e: f64,
        nu: f64,
        k: f64,
        gw: f64,
        pht: f64,
        bp: f64,
        kww: f64,
        kss: f64,
        uf: f64,
        gr: f64,
        rhob: f64,
    },
    ElasticInterface {
        kn: f64,
        ks: f64,
        gap: f64,
        lkt: f64,
        lkb: f64,
        iopen: f64,
    },
    PoroInterfaceMC {
        kn: f64,
        ks: f64,
        cf: f64,
        phif: f64,
        psif: f64,
        tcut: f64,
        gap: f64,
        lkt: f64,
        lkb: f64,
        iopen: f64,
    },
}

impl Material {
    /// Builds a material of the given type from a parameter lookup
    ///
    /// # Arguments
    /// * `material_type` - One of elastic, poroElastic, elasticInterface, poroInterfaceMC
    /// * `lookup` - Returns the value of a parameter id, if present
    pub fn build<F>(material_type: &str, lookup: F) -> Result<Material, FaultMeshError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let p = |id: &str| {
            lookup(id).ok_or_else(|| {
                FaultMeshError::Configuration(format!(
                    "Material of type {material_type} is missing parameter {id}"
                ))
            })
        };

        let material = match material_type {
            "elastic" => Material::Elastic {
                e: p("E")?,
                nu: p("nu")?,
            },
            "poroElastic" => Material::PoroElastic {
                e: p("E")?,
                nu: p("nu")?,
                k: p("K")?,
                gw: p("gw")?,
                pht: p("Pht")?,
                bp: p("Bp")?,
                kww: p("Kww")?,
                kss: p("Kss")?,
                uf: p("uf")?,
                gr: p("gr")?,
                rhob: p("rhob")?,
            },
            "elasticInterface" => Material::ElasticInterface {
                kn: p("Kn")?,
                ks: p("Ks")?,
                gap: p("Gap")?,
                lkt: p("Lkt")?,
                lkb: p("Lkb")?,
                iopen: p("Iopen")?,
            },
            "poroInterfaceMC" => Material::PoroInterfaceMC {
                kn: p("Kn")?,
                ks: p("Ks")?,
                cf: p("Cf")?,
                phif: p("Phif")?,
                psif: p("Psif")?,
                tcut: p("Tcut")?,
                gap: p("Gap")?,
                lkt: p("Lkt")?,
                lkb: p("Lkb")?,
                iopen: p("Iopen")?,
            },
            other => {
                return Err(FaultMeshError::Configuration(format!(
                    "Unknown material type '{other}'"
                )))
            }
        };

        Ok(material)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Material::Elastic { .. } => "elastic",
            Material::PoroElastic { .. } => "poroElastic",
            Material::ElasticInterface { .. } => "elasticInterface",
            Material::PoroInterfaceMC { .. } => "poroInterfaceMC",
        }
    }

    /// Parameter ids and values in their fixed order
    pub fn parameters(&self) -> Vec<(&'static str, f64)> {
        match *self {
            Material::Elastic { e, nu } => vec![("E", e), ("nu", nu)],
            Material::PoroElastic {
                e,
                nu,
                k,
                gw,
                pht,
                bp,
                kww,
                kss,
                uf,
                gr,
                rhob,
            } => vec![
                ("E", e),
                ("nu", nu),
                ("K", k),
                ("gw", gw),
                ("Pht", pht),
                ("Bp", bp),
                ("Kww", kww),
                ("Kss", kss),
                ("uf", uf),
                ("gr", gr),
                ("rhob", rhob),
            ],
            Material::ElasticInterface {
                kn,
                ks,
                gap,
                lkt,
                lkb,
                iopen,
            } => vec![
                ("Kn", kn),
                ("Ks", ks),
                ("Gap", gap),
                ("Lkt", lkt),
                ("Lkb", lkb),
                ("Iopen", iopen),
            ],
            Material::PoroInterfaceMC {
                kn,
                ks,
                cf,
                phif,
                psif,
                tcut,
                gap,
                lkt,
                lkb,
                iopen,
            } => vec![
                ("Kn", kn),
                ("Ks", ks),
                ("Cf", cf),
                ("Phif", phif),
                ("Psif", psif),
                ("Tcut", tcut),
                ("Gap", gap),
                ("Lkt", lkt),
                ("Lkb", lkb),
                ("Iopen", iopen),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    PlaneStrain,
    PlaneStress,
    Axisymmetric,
    ThreeD,
}

impl AnalysisType {
    pub fn parse(name: &str) -> Result<AnalysisType, FaultMeshError> {
        match name {
            "PlaneStrain" => Ok(AnalysisType::PlaneStrain),
            "PlaneStress" => Ok(AnalysisType::PlaneStress),
            "Axisymmetric" => Ok(AnalysisType::Axisymmetric),
            "3D" => Ok(AnalysisType::ThreeD),
            other => Err(FaultMeshError::Configuration(format!(
                "Unknown analysis type '{other}'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisType::PlaneStrain => "PlaneStrain",
            AnalysisType::PlaneStress => "PlaneStress",
            AnalysisType::Axisymmetric => "Axisymmetric",
            AnalysisType::ThreeD => "3D",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    pub id: &'static str,
    pub dim: usize,
    pub description: String,
    pub unit: &'static str,
    pub group: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Physics {
    Mechanical(AnalysisType),
    HydroMechanical(AnalysisType),
}

impl Physics {
    pub fn id(&self) -> &'static str {
        match self {
            Physics::Mechanical(_) => "Mechanical",
            Physics::HydroMechanical(_) => "CoupledHM",
        }
    }

    /// Solver physics name, e.g. `CoupledHMFemPhysics.PlaneStrain`
    pub fn name(&self) -> String {
        let analysis = match self {
            Physics::Mechanical(a) | Physics::HydroMechanical(a) => a,
        };
        format!("{}FemPhysics.{}", self.id(), analysis.name())
    }

    pub fn state_variables(&self, model_dim: usize) -> Vec<StateVariable> {
        let displacement = StateVariable {
            id: "u",
            dim: model_dim,
            description: if model_dim == 3 {
                "Displacements in the X, Y and Z directions".to_owned()
            } else {
                "Displacements in the X and Y directions".to_owned()
            },
            unit: "m",
            group: "mechanic",
        };

        match self {
            Physics::Mechanical(_) => vec![displacement],
            Physics::HydroMechanical(_) => vec![
                displacement,
                StateVariable {
                    id: "p",
                    dim: 1,
                    description: "Pore pressure degree-of-freedom".to_owned(),
                    unit: "kPa",
                    group: "hydraulic",
                },
            ],
        }
    }
}

/// Boundary condition variable: description, unit and default value
pub fn bc_variable_info(id: &str) -> (&'static str, &'static str, f64) {
    match id {
        "ux" => ("Fixed node displacement in the X direction", "m", -9999.0),
        "uy" => ("Fixed node displacement in the Y direction", "m", -9999.0),
        "uz" => ("Fixed node displacement in the Z direction", "m", -9999.0),
        "f" => ("Concentrated nodal force", "kN", 0.0),
        "P" => ("Fixed node pore pressure", "kPa", -9999.0),
        "qw" => ("concentrated pore flow", "m^3/s", -9999.0),
        _ => ("", "", 0.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    NodeDisplacement { dim: usize },
    NodeConcentratedForce { dim: usize },
    NodePoreFlow,
    NodePorePressure,
}

impl BoundaryKind {
    pub fn parse(name: &str, model_dim: usize) -> Result<BoundaryKind, FaultMeshError> {
        match name {
            "displacement" => Ok(BoundaryKind::NodeDisplacement { dim: model_dim }),
            "force" => Ok(BoundaryKind::NodeConcentratedForce { dim: model_dim }),
            "pore_flow" => Ok(BoundaryKind::NodePoreFlow),
            "pore_pressure" => Ok(BoundaryKind::NodePorePressure),
            other => Err(FaultMeshError::Configuration(format!(
                "Unknown boundary condition type '{other}'"
            ))),
        }
    }

    /// Type name understood by the solver
    pub fn type_name(&self) -> &'static str {
        match self {
            BoundaryKind::NodeDisplacement { .. } => "node displacements",
            BoundaryKind::NodeConcentratedForce { .. } => "node concentrated forces",
            BoundaryKind::NodePoreFlow => "node pore flow",
            BoundaryKind::NodePorePressure => "node pore pressure",
        }
    }

    pub fn parameter_ids(&self) -> &'static [&'static str] {
        match self {
            BoundaryKind::NodeDisplacement { dim: 3 } => &["ux", "uy", "uz"],
            BoundaryKind::NodeDisplacement { .. } => &["ux", "uy"],
            BoundaryKind::NodeConcentratedForce { .. } => &["f"],
            BoundaryKind::NodePoreFlow => &["qw"],
            BoundaryKind::NodePorePressure => &["P"],
        }
    }

    /// Number of values given per node set
    pub fn dim(&self) -> usize {
        match self {
            BoundaryKind::NodeDisplacement { dim } | BoundaryKind::NodeConcentratedForce { dim } => *dim,
            BoundaryKind::NodePoreFlow | BoundaryKind::NodePorePressure => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSetValue {
    pub node_set: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition {
    id: String,
    kind: BoundaryKind,
    node_values: Vec<NodeSetValue>,
}

impl BoundaryCondition {
    pub fn new(
        id: &str,
        kind: BoundaryKind,
        node_values: Vec<NodeSetValue>,
    ) -> Result<BoundaryCondition, FaultMeshError> {
        for row in node_values.iter() {
            if row.values.len() != kind.dim() {
                return Err(FaultMeshError::Configuration(format!(
                    "Boundary condition '{id}' expects {} values for node set {}, found {}",
                    kind.dim(),
                    row.node_set,
                    row.values.len()
                )));
            }
        }

        Ok(BoundaryCondition {
            id: id.to_owned(),
            kind,
            node_values,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> BoundaryKind {
        self.kind
    }

    pub fn node_values(&self) -> &[NodeSetValue] {
        &self.node_values
    }
}

/// Static model data written next to the mesh
#[derive(Debug, Clone)]
pub struct ModelDescription {
    pub dimension: usize,
    pub materials: Vec<(String, Material)>,
    pub physics: Vec<Physics>,
    pub boundary_conditions: Vec<BoundaryCondition>,
}

impl ModelDescription {
    /// State variables of all physics, first declaration of an id wins
    pub fn state_variables(&self) -> Vec<StateVariable> {
        let mut variables: Vec<StateVariable> = Vec::new();
        for physics in self.physics.iter() {
            for variable in physics.state_variables(self.dimension) {
                if !variables.iter().any(|v| v.id == variable.id) {
                    variables.push(variable);
                }
            }
        }
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn poro_elastic_needs_all_eleven_parameters() {
        let mut values: HashMap<&str, f64> = [
            ("E", 1.0e7),
            ("nu", 0.25),
            ("K", 1.6722408e-6),
            ("gw", 10.0),
            ("Pht", 0.1),
            ("Bp", 1.0e-25),
            ("Kww", 2.2e6),
            ("Kss", 1.0e-25),
            ("uf", 5.98e-7),
            ("gr", 10.0),
            ("rhob", 2260.0),
        ]
        .into_iter()
        .collect();

        let material = Material::build("poroElastic", |id| values.get(id).copied()).unwrap();
        assert_eq!(material.type_name(), "poroElastic");
        assert_eq!(material.parameters().len(), 11);
        assert_eq!(material.parameters()[2], ("K", 1.6722408e-6));

        values.remove("rhob");
        let err = Material::build("poroElastic", |id| values.get(id).copied()).unwrap_err();
        assert!(err.to_string().contains("rhob"));
    }

    #[test]
    fn unknown_material_type_is_rejected() {
        let err = Material::build("plastic", |_| Some(1.0)).unwrap_err();
        assert!(matches!(err, FaultMeshError::Configuration(_)));
    }

    #[test]
    fn hydromechanical_physics_declares_pressure() {
        let physics = Physics::HydroMechanical(AnalysisType::PlaneStrain);
        assert_eq!(physics.name(), "CoupledHMFemPhysics.PlaneStrain");
        let ids: Vec<&str> = physics.state_variables(2).iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["u", "p"]);
    }

    #[test]
    fn shared_state_variables_are_declared_once() {
        let model = ModelDescription {
            dimension: 2,
            materials: Vec::new(),
            physics: vec![
                Physics::Mechanical(AnalysisType::PlaneStrain),
                Physics::HydroMechanical(AnalysisType::PlaneStrain),
            ],
            boundary_conditions: Vec::new(),
        };
        let ids: Vec<&str> = model.state_variables().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["u", "p"]);
    }

    #[test]
    fn displacement_rows_match_model_dimension() {
        let kind = BoundaryKind::parse("displacement", 3).unwrap();
        assert_eq!(kind.parameter_ids(), &["ux", "uy", "uz"]);

        let rows = vec![NodeSetValue {
            node_set: "bottomBorder".to_owned(),
            values: vec![-9999.0, 0.0],
        }];
        assert!(BoundaryCondition::new("bcDisp", kind, rows.clone()).is_err());

        let planar = BoundaryKind::parse("displacement", 2).unwrap();
        let bc = BoundaryCondition::new("bcDisp", planar, rows).unwrap();
        assert_eq!(bc.kind().type_name(), "node displacements");
    }
}
