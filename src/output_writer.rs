use faer::MatRef;

/// Time-history writer for the coupled run: displacement, velocity, and
/// nodal force per structural node per time step, stored as netcdf variables
/// over an unlimited time dimension.
pub struct OutputWriter<'a> {
    netcdf_file: &'a mut netcdf::FileMut,
    data: [Vec<f64>; 3], // x, y, z
}

impl<'a> OutputWriter<'a> {
    pub fn new(netcdf_file: &'a mut netcdf::FileMut, n_nodes: usize) -> Self {
        netcdf_file.add_unlimited_dimension("time").unwrap();
        netcdf_file.add_dimension("nodes", n_nodes).unwrap();
        let dims = &["time", "nodes"];
        ["u", "v", "f"].iter().for_each(|&var| {
            ["x", "y", "z"].iter().for_each(|&comp| {
                let v = format!("{}_{}", var, comp);
                netcdf_file.add_variable::<f64>(&v, dims).unwrap();
            });
        });

        Self {
            netcdf_file,
            data: [vec![0.0; n_nodes], vec![0.0; n_nodes], vec![0.0; n_nodes]],
        }
    }

    /// Write one time step. Each field is `[3][n_nodes]`.
    pub fn write(
        &mut self,
        displacement: MatRef<f64>,
        velocity: MatRef<f64>,
        nodal_force: MatRef<f64>,
        time_step: usize,
    ) {
        self.write_field("u", displacement, time_step);
        self.write_field("v", velocity, time_step);
        self.write_field("f", nodal_force, time_step);
    }

    fn write_field(&mut self, var: &str, field: MatRef<f64>, time_step: usize) {
        field.col_iter().enumerate().for_each(|(i, c)| {
            c.iter().enumerate().for_each(|(j, &val)| {
                self.data[j][i] = val;
            });
        });
        ["x", "y", "z"].iter().enumerate().for_each(|(j, &comp)| {
            self.netcdf_file
                .variable_mut(&format!("{}_{}", var, comp))
                .unwrap()
                .put_values(&self.data[j], (time_step, ..))
                .unwrap();
        });
    }
}
