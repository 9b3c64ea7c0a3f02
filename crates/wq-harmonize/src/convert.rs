//! Cross-dimension conversions no linear unit algebra can do: dissolved
//! oxygen saturation to concentration, salinity/conductivity to practical
//! salinity, turbidity scale changes, and moles to mass.
//!
//! Each conversion implements a published empirical formula. The pipeline
//! invokes them only after deciding that a dimensional mismatch exists and
//! that the formula applies to both the current and the target dimension.

use crate::error::{HarmonizeError, Result};
use crate::units::{convert, Quantity, UnitRegistry};

/// Molecular weights (g/mol) for speciation labels found in WQP data.
/// Organic carbon is treated as glucose.
pub static PERIODIC_MW: &[(&str, f64)] = &[
    ("Organic carbon", 180.16),
    ("C6H12O6", 180.16),
    ("Phosphorus", 30.97),
    ("P", 30.97),
    ("PO4", 94.97),
    ("Nitrogen", 14.01),
    ("N", 14.01),
    ("NO3", 62.01),
    ("NO2", 46.01),
    ("NH4", 18.04),
    ("NH3", 17.03),
    ("SiO3", 76.08),
];

/// Molecular weight for a speciation or characteristic label.
pub fn molecular_weight(label: &str) -> Option<f64> {
    PERIODIC_MW
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, mw)| *mw)
}

/// Standard pressure assumed when none is given.
pub const STANDARD_PRESSURE_ATM: f64 = 1.0;
/// Standard temperature assumed when none is given.
pub const STANDARD_TEMPERATURE_C: f64 = 25.0;

/// Equilibrium oxygen solubility C_p in mg/l at the given pressure and
/// temperature, after Benson & Krause. The standard-condition value is
/// pinned to the constant long used for STP data.
pub fn oxygen_solubility(pressure_atm: f64, temperature_c: f64) -> f64 {
    if pressure_atm == STANDARD_PRESSURE_ATM && temperature_c == STANDARD_TEMPERATURE_C {
        return 8.262332418;
    }
    let t = temperature_c;
    let p = pressure_atm;
    let t_k = t + 273.15;
    // ln of water vapor partial pressure (atm).
    let ln_pwv = 11.8571 - (3840.7 / t_k) - (216_961.0 / (t_k * t_k));
    let pwv = ln_pwv.exp();
    // Equilibrium concentration at 1 atm total pressure.
    let c_star = (7.7117 - 1.31403 * (t + 45.93).ln()).exp();
    let theta = 0.000975 - (0.00001426 * t) + (0.00000006436 * t * t);
    c_star * p * ((1.0 - pwv / p) * (1.0 - theta * p))
        / ((1.0 - pwv) * (1.0 - theta))
}

/// Dissolved oxygen percent saturation, as a dimensionless fraction, to
/// concentration in mg/l.
pub fn do_saturation(saturation_fraction: f64, pressure_atm: f64, temperature_c: f64) -> f64 {
    saturation_fraction * oxygen_solubility(pressure_atm, temperature_c)
}

/// Dissolved oxygen concentration in mg/l to percent saturation.
pub fn do_concentration(concentration_mg_l: f64, pressure_atm: f64, temperature_c: f64) -> f64 {
    100.0 * concentration_mg_l / oxygen_solubility(pressure_atm, temperature_c)
}

/// Absolute salinity as density (g/l) to practical salinity (g/kg).
///
/// Uses the standard reference ratio 35.16504/35.0. Inputs below 1000 are
/// read as density anomalies (density minus pure water) and shifted onto
/// the absolute scale first.
pub fn density_to_psu(density_g_l: f64) -> f64 {
    let reference = 35.16504 / 35.0;
    if density_g_l > 1000.0 {
        density_g_l * reference - 1000.0
    } else {
        (density_g_l + 1000.0) * reference - 1000.0
    }
}

/// Practical salinity to density in mg/ml, using the UNESCO equation of
/// state polynomial (EOS-80, one atmosphere).
pub fn psu_to_density(practical_salinity: f64, temperature_c: f64) -> f64 {
    let t = temperature_c;
    let val = practical_salinity;

    // Pure water density (SMOW, Craig 1961).
    let pure_water = 999.842594
        + 6.793952e-2 * t
        - 9.095290e-3 * t.powi(2)
        + 1.001685e-4 * t.powi(3)
        - 1.120083e-6 * t.powi(4)
        + 6.536336e-9 * t.powi(5);

    let a = 8.24493e-1 - 4.0899e-3 * t + 7.6438e-5 * t.powi(2) - 8.2467e-7 * t.powi(3)
        + 5.3875e-9 * t.powi(4);
    let b = -5.72466e-3 + 1.0227e-4 * t - 1.6546e-6 * t.powi(2);

    pure_water + a * val + b * val.powf(1.5) + 4.8314e-4 * val.powi(2)
}

/// Estimate practical salinity from conductivity in uS/cm via the PSS-78
/// method, rounded to 3 decimal places.
///
/// References: IOC, SCOR and IAPSO (2010), UNESCO Manuals and Guides 56;
/// ported from the R wq::ec2pss function.
pub fn conductivity_to_psu(conductivity_us_cm: f64, pressure_atm: f64, temperature_c: f64) -> f64 {
    let t = temperature_c;
    let p = pressure_atm;

    let a = [0.008, -0.1692, 25.3851, 14.0941, -7.0261, 2.7081];
    let b = [5e-04, -0.0056, -0.0066, -0.0375, 0.0636, -0.0144];
    let c = [0.6766097, 0.0200564, 0.0001104, -6.9698e-07, 1.0031e-09];
    let d = [0.03426, 0.0004464, 0.4215, -0.003107];
    let e = [0.000207, -6.37e-08, 3.989e-12];
    let k = 0.0162;

    let ct = (conductivity_us_cm * (1.0 + 0.0191 * (t - 25.0))).round();
    let r = (ct / 1000.0) / 42.914;
    let rt = c[0] + c[1] * t + c[2] * t.powi(2) + c[3] * t.powi(3) + c[4] * t.powi(4);

    let rp = 1.0
        + (p * e[0] + e[1] * p.powi(2) + e[2] * p.powi(3))
            / (1.0 + d[0] * t + d[1] * t.powi(2) + (d[2] + d[3] * t) * r);
    let rt1 = r / (rp * rt);

    let ds = (b[0]
        + b[1] * rt1.powf(0.5)
        + b[2] * rt1
        + b[3] * rt1.powf(1.5)
        + b[4] * rt1.powi(2)
        + b[5] * rt1.powf(2.5))
        * (t - 15.0)
        / (1.0 + k * (t - 15.0));
    let s = a[0]
        + a[1] * rt1.powf(0.5)
        + a[2] * rt1
        + a[3] * rt1.powf(1.5)
        + a[4] * rt1.powi(2)
        + a[5] * rt1.powf(2.5)
        + ds;

    (s * 1000.0).round() / 1000.0
}

/// Turbidity-tube reading in centimeters to NTU.
///
/// Fitted power curve over the Utah State turbidity tube conversion chart
/// (R^2 > 0.99).
pub fn cm_to_ntu(centimeters: f64) -> f64 {
    3941.8 * centimeters.powf(-1.509)
}

/// NTU to turbidity-tube centimeters, inverse fit of the same chart.
pub fn ntu_to_cm(ntu: f64) -> f64 {
    241.27 * ntu.powf(-0.662)
}

/// Jackson Turbidity Units to NTU. Linear relationship, 1 -> 19,
/// 0.053 -> 1, 0.4 -> 7.5 (Otilia et al. 2013).
pub fn jtu_to_ntu(jtu: f64) -> f64 {
    19.025 * jtu - 0.0477
}

/// SiO2 calibration-standard concentration to NTU. Linear relationship,
/// 2.5 -> 19, 0.13 -> 1, 1 -> 7.5 (Otilia et al. 2013).
pub fn sio2_to_ntu(sio2: f64) -> f64 {
    7.6028 * sio2 - 0.0327
}

/// Formazin Nephelometric Units to NTU (Gohin 2011). Not applied by
/// default; the registry aliases FNU to NTU instead.
pub fn fnu_to_ntu(fnu: f64) -> f64 {
    fnu * 1.267
}

/// Convert a mass quantity to moles of substance, using the molecular
/// weight for `label`.
pub fn mass_to_moles(registry: &UnitRegistry, label: &str, quantity: &Quantity) -> Result<Quantity> {
    let mw = molecular_weight(label)
        .ok_or_else(|| HarmonizeError::UnknownMolecularWeight(label.to_string()))?;
    let grams = convert(registry, quantity.magnitude, &quantity.unit, "gram")?;
    Ok(Quantity::new(grams / mw, "mole"))
}

/// Convert a moles-of-substance quantity to mass in grams.
///
/// The molecular weight comes from `basis` (a speciation label, with any
/// leading "as " stripped) or, failing that, from the characteristic name.
pub fn moles_to_mass(
    registry: &UnitRegistry,
    quantity: &Quantity,
    basis: Option<&str>,
    characteristic: Option<&str>,
) -> Result<Quantity> {
    let label = match (basis, characteristic) {
        (Some(b), _) => b.strip_prefix("as ").unwrap_or(b),
        (None, Some(c)) => c,
        (None, None) => return Err(HarmonizeError::MoleBasisRequired),
    };
    let mw = molecular_weight(label)
        .ok_or_else(|| HarmonizeError::UnknownMolecularWeight(label.to_string()))?;
    let moles = convert(registry, quantity.magnitude, &quantity.unit, "mole")?;
    Ok(Quantity::new(moles * mw, "gram"))
}

/// An empirical conversion packaged for batch application: values are
/// first converted into `input_unit`, run through the formula at standard
/// pressure and temperature, and labeled with `output_unit`.
#[derive(Debug, Clone, Copy)]
pub struct EmpiricalConversion {
    pub name: &'static str,
    pub input_unit: &'static str,
    pub output_unit: &'static str,
    apply: fn(f64) -> f64,
}

impl EmpiricalConversion {
    /// Run the formula on one value already in `input_unit`.
    pub fn apply(&self, value: f64) -> f64 {
        (self.apply)(value)
    }

    /// Convert a quantity in any compatible unit through the formula.
    pub fn convert_quantity(&self, registry: &UnitRegistry, quantity: &Quantity) -> Result<Quantity> {
        let value = convert(registry, quantity.magnitude, &quantity.unit, self.input_unit)?;
        Ok(Quantity::new((self.apply)(value), self.output_unit))
    }
}

fn do_saturation_std(v: f64) -> f64 {
    do_saturation(v, STANDARD_PRESSURE_ATM, STANDARD_TEMPERATURE_C)
}

fn do_concentration_std(v: f64) -> f64 {
    do_concentration(v, STANDARD_PRESSURE_ATM, STANDARD_TEMPERATURE_C)
}

fn psu_to_density_std(v: f64) -> f64 {
    psu_to_density(v, STANDARD_TEMPERATURE_C)
}

fn conductivity_to_psu_std(v: f64) -> f64 {
    // Sea-surface convention: gauge pressure zero.
    conductivity_to_psu(v, 0.0, STANDARD_TEMPERATURE_C)
}

/// DO percent saturation to mg/l concentration.
pub const DO_SATURATION: EmpiricalConversion = EmpiricalConversion {
    name: "DO_saturation",
    input_unit: "dimensionless",
    output_unit: "milligram / liter",
    apply: do_saturation_std,
};

/// DO concentration to percent saturation.
pub const DO_CONCENTRATION: EmpiricalConversion = EmpiricalConversion {
    name: "DO_concentration",
    input_unit: "milligram / liter",
    output_unit: "percent",
    apply: do_concentration_std,
};

/// Salinity as density to practical salinity.
pub const DENSITY_TO_PSU: EmpiricalConversion = EmpiricalConversion {
    name: "density_to_PSU",
    input_unit: "gram / liter",
    output_unit: "gram / kilogram",
    apply: density_to_psu,
};

/// Practical salinity to density.
pub const PSU_TO_DENSITY: EmpiricalConversion = EmpiricalConversion {
    name: "PSU_to_density",
    input_unit: "ppth",
    output_unit: "milligram / milliliter",
    apply: psu_to_density_std,
};

/// Conductivity to practical salinity.
pub const CONDUCTIVITY_TO_PSU: EmpiricalConversion = EmpiricalConversion {
    name: "conductivity_to_PSU",
    input_unit: "uS/cm",
    output_unit: "dimensionless",
    apply: conductivity_to_psu_std,
};

/// Turbidity tube centimeters to NTU.
pub const CM_TO_NTU: EmpiricalConversion = EmpiricalConversion {
    name: "cm_to_NTU",
    input_unit: "centimeter",
    output_unit: "NTU",
    apply: cm_to_ntu,
};

/// NTU to turbidity tube centimeters.
pub const NTU_TO_CM: EmpiricalConversion = EmpiricalConversion {
    name: "NTU_to_cm",
    input_unit: "NTU",
    output_unit: "centimeter",
    apply: ntu_to_cm,
};

/// JTU to NTU.
pub const JTU_TO_NTU: EmpiricalConversion = EmpiricalConversion {
    name: "JTU_to_NTU",
    input_unit: "dimensionless",
    output_unit: "NTU",
    apply: jtu_to_ntu,
};

/// SiO2 proxy to NTU.
pub const SIO2_TO_NTU: EmpiricalConversion = EmpiricalConversion {
    name: "SiO2_to_NTU",
    input_unit: "dimensionless",
    output_unit: "NTU",
    apply: sio2_to_ntu,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::Characteristic;

    fn scoped_registry(c: Characteristic) -> UnitRegistry {
        let mut reg = UnitRegistry::standard();
        reg.apply_definitions(c.registry_extensions());
        reg
    }

    #[test]
    fn test_oxygen_solubility_standard_conditions() {
        assert_eq!(oxygen_solubility(1.0, 25.0), 8.262332418);
        // Full formula should land close to the pinned constant.
        let computed = oxygen_solubility(1.0, 25.0 + 1e-9);
        assert!((computed - 8.262332418).abs() < 0.01, "got {computed}");
        // Colder water holds more oxygen.
        assert!(oxygen_solubility(1.0, 10.0) > oxygen_solubility(1.0, 30.0));
    }

    #[test]
    fn test_do_saturation_fraction_to_concentration() {
        // 10% saturation -> 0.1 fraction -> 0.826 mg/l at STP.
        let mg_l = do_saturation(0.1, 1.0, 25.0);
        assert!((mg_l - 0.8262332418).abs() < 1e-12);
    }

    #[test]
    fn test_do_concentration_inverts_saturation() {
        let mg_l = do_saturation(0.5, 1.0, 25.0);
        let pct = do_concentration(mg_l, 1.0, 25.0);
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_density_to_psu_branches_agree() {
        // Seawater density 1025 g/l and its anomaly 25 g/l are the same water.
        let from_absolute = density_to_psu(1025.0);
        let from_anomaly = density_to_psu(25.0);
        assert!((from_absolute - from_anomaly).abs() < 1e-9);
        assert!((from_absolute - 29.8333).abs() < 1e-3, "got {from_absolute}");
    }

    #[test]
    fn test_psu_to_density_seawater() {
        // S=35 at 25 C is about 1023.34 kg/m^3 per EOS-80.
        let density = psu_to_density(35.0, 25.0);
        assert!((density - 1023.34).abs() < 0.01, "got {density}");
        // Fresh water limit recovers pure water density.
        let fresh = psu_to_density(0.0, 25.0);
        assert!((fresh - 997.048).abs() < 0.001, "got {fresh}");
    }

    #[test]
    fn test_conductivity_to_psu_reference_point() {
        // Standard seawater is ~53.087 mS/cm at 25 C and S=35.
        let s = conductivity_to_psu(53_087.0, 0.0, 25.0);
        assert!((s - 35.0).abs() < 0.05, "got {s}");
        // Rounded to 3 decimal places.
        assert_eq!(s, (s * 1000.0).round() / 1000.0);
    }

    #[test]
    fn test_turbidity_linear_fits() {
        assert!((jtu_to_ntu(1.0) - 18.9773).abs() < 1e-9);
        assert!((sio2_to_ntu(2.5) - 18.9743).abs() < 1e-9);
        assert!((fnu_to_ntu(2.0) - 2.534).abs() < 1e-12);
    }

    #[test]
    fn test_turbidity_tube_curves() {
        // Shallower tube readings mean more turbid water.
        assert!(cm_to_ntu(5.0) > cm_to_ntu(50.0));
        assert!(ntu_to_cm(10.0) > ntu_to_cm(100.0));
        let ntu = cm_to_ntu(241.27_f64.powf(1.0 / 1.509));
        assert!(ntu > 0.0);
    }

    #[test]
    fn test_moles_to_mass_basis() {
        let reg = UnitRegistry::standard();
        let q = Quantity::new(1.0, "umol");
        let mass = moles_to_mass(&reg, &q, Some("as P"), None).unwrap();
        assert!((mass.magnitude - 3.097e-5).abs() < 1e-12);
        assert_eq!(mass.unit, "gram");
    }

    #[test]
    fn test_moles_to_mass_characteristic_fallback() {
        let reg = UnitRegistry::standard();
        let q = Quantity::new(1.0, "umol");
        let mass = moles_to_mass(&reg, &q, None, Some("Organic carbon")).unwrap();
        assert!((mass.magnitude - 1.8016e-4).abs() < 1e-12);
    }

    #[test]
    fn test_moles_to_mass_requires_label() {
        let reg = UnitRegistry::standard();
        let q = Quantity::new(1.0, "mol");
        let err = moles_to_mass(&reg, &q, None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Characteristic Name or basis (Speciation) required"
        );
        let err = moles_to_mass(&reg, &q, Some("Xe"), None).unwrap_err();
        assert!(err.to_string().contains("no known molecular weight"));
    }

    #[test]
    fn test_mass_to_moles_round_trip() {
        let reg = UnitRegistry::standard();
        let q = Quantity::new(30.97, "g");
        let moles = mass_to_moles(&reg, "P", &q).unwrap();
        assert!((moles.magnitude - 1.0).abs() < 1e-12);
        assert_eq!(moles.unit, "mole");
    }

    #[test]
    fn test_empirical_conversion_percent_input() {
        let reg = scoped_registry(Characteristic::DissolvedOxygen);
        let q = Quantity::new(10.0, "percent");
        let out = DO_SATURATION.convert_quantity(&reg, &q).unwrap();
        assert!((out.magnitude - 0.8262332418).abs() < 1e-9);
        assert_eq!(out.unit, "milligram / liter");
    }

    #[test]
    fn test_empirical_conversion_turbidity_alias_input() {
        let reg = scoped_registry(Characteristic::Turbidity);
        // FNU is aliased onto NTU, so it feeds NTU_to_cm unchanged.
        let q = Quantity::new(100.0, "FNU");
        let out = NTU_TO_CM.convert_quantity(&reg, &q).unwrap();
        assert!((out.magnitude - 241.27 * 100.0_f64.powf(-0.662)).abs() < 1e-9);
        assert_eq!(out.unit, "centimeter");
    }

    #[test]
    fn test_empirical_conversion_incompatible_input() {
        let reg = scoped_registry(Characteristic::Turbidity);
        let q = Quantity::new(1.0, "NTU");
        assert!(JTU_TO_NTU.convert_quantity(&reg, &q).is_err());
    }
}
